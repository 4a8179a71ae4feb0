use std::convert::Infallible;
use std::sync::Arc;

use clap::Parser;
use cookie::Cookie;
use warp::http::{StatusCode, Uri};
use warp::{Filter, Rejection, Reply};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::args::Args;
use crate::auth::{Credentials, Registration, SessionId};
use crate::backend::Backend;
use crate::home::ProfilePage;
use crate::map::MapNew;
use crate::point::PointNew;
use crate::relation::{FavouriteToggle, RelationNew};
use crate::wikimaps::{Error, WikiMaps};

mod args;
mod auth;
mod backend;
mod home;
mod map;
mod point;
mod relation;
mod user;
mod wikimaps;

const SESSION_COOKIE: &str = "sessionid";

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();

    tracing::subscriber::set_global_default(subscriber).unwrap();

    let args = Args::parse();
    let addr = args.addr().expect("couldn't parse listen address");
    let secure = args.secure();

    let backend = Backend::new(args.data_dir(), args.env()).await;
    let wikimaps = Arc::new(WikiMaps::new(backend, args.api_key()));

    let sync = {
        let wikimaps = Arc::clone(&wikimaps);
        warp::any().map(move || Arc::clone(&wikimaps))
    };

    let session = warp::cookie::optional::<String>(SESSION_COOKIE)
        .map(|raw: Option<String>| -> Option<SessionId> { raw.and_then(|s| s.parse().ok()) });

    let home = warp::path::end()
        .and(warp::get())
        .and(sync.clone())
        .and(session.clone())
        .and_then(|sync: Arc<WikiMaps>, session_id| async move {
            let user = sync.authenticate(session_id).await.map_err(custom)?;
            let page = sync.home(user).await.map_err(custom)?;

            Ok::<_, Rejection>(warp::reply::json(&page))
        });

    let contributions = warp::path!("contributions" / i64)
        .and(warp::get())
        .and(sync.clone())
        .and_then(|user_id, sync: Arc<WikiMaps>| async move {
            let maps = sync.contributions(user_id).await.map_err(custom)?;

            Ok::<_, Rejection>(warp::reply::json(&maps))
        });

    let favourites = {
        let toggle = warp::path!("favourites")
            .and(warp::put())
            .and(warp::query::<FavouriteToggle>())
            .and(sync.clone())
            .and_then(|toggle: FavouriteToggle, sync: Arc<WikiMaps>| async move {
                let id = sync.toggle_favourite(toggle).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&id))
            });

        let for_user = warp::path!("favourites" / i64)
            .and(warp::get())
            .and(sync.clone())
            .and_then(|user_id, sync: Arc<WikiMaps>| async move {
                let maps = sync.favourites(user_id).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&maps))
            });

        toggle.or(for_user)
    };

    let users = warp::path!("users")
        .and(warp::get())
        .and(sync.clone())
        .and_then(|sync: Arc<WikiMaps>| async move {
            let users = sync.users().await.map_err(custom)?;

            Ok::<_, Rejection>(warp::reply::json(&users))
        });

    let maps = {
        let all = warp::path!("maps")
            .and(warp::get())
            .and(sync.clone())
            .and_then(|sync: Arc<WikiMaps>| async move {
                let maps = sync.maps().await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&maps))
            });

        let relations = warp::path!("maps" / i64)
            .and(warp::get())
            .and(sync.clone())
            .and_then(|user_id, sync: Arc<WikiMaps>| async move {
                let relations = sync.relations_for_user(user_id).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&relations))
            });

        let single = warp::path!("map" / i64)
            .and(warp::get())
            .and(sync.clone())
            .and_then(|map_id, sync: Arc<WikiMaps>| async move {
                let map = sync.map(map_id).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&map))
            });

        let points = warp::path!("maps" / i64 / "points")
            .and(warp::get())
            .and(sync.clone())
            .and_then(|map_id, sync: Arc<WikiMaps>| async move {
                let points = sync.points_for_map(map_id).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&points))
            });

        let create = warp::path!("map")
            .and(warp::post())
            .and(warp::body::form::<MapNew>())
            .and(session.clone())
            .and(sync.clone())
            .and_then(
                |map: MapNew, session_id, sync: Arc<WikiMaps>| async move {
                    sync.create_map(map).await.map_err(custom)?;

                    // re-render home for the current user
                    let user = sync.authenticate(session_id).await.map_err(custom)?;
                    let page = sync.home(user).await.map_err(custom)?;

                    Ok::<_, Rejection>(warp::reply::json(&page))
                },
            );

        all.or(relations).or(single).or(points).or(create)
    };

    let points = {
        let create = warp::path!("point")
            .and(warp::post())
            .and(warp::body::form::<PointNew>())
            .and(sync.clone())
            .and_then(|point: PointNew, sync: Arc<WikiMaps>| async move {
                let id = sync.create_point(point).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&id))
            });

        let update = warp::path!("point" / i64)
            .and(warp::put())
            .and(warp::body::form::<PointNew>())
            .and(sync.clone())
            .and_then(|point_id, point: PointNew, sync: Arc<WikiMaps>| async move {
                let id = sync.update_point(point_id, point).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&id))
            });

        let delete = warp::path!("point" / i64)
            .and(warp::delete())
            .and(sync.clone())
            .and_then(|point_id, sync: Arc<WikiMaps>| async move {
                sync.delete_point(point_id).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::with_status(
                    warp::reply(),
                    StatusCode::NO_CONTENT,
                ))
            });

        create.or(update).or(delete)
    };

    let relations = warp::path!("users_map")
        .and(warp::post())
        .and(warp::body::form::<RelationNew>())
        .and(session.clone())
        .and(sync.clone())
        .and_then(
            |relation: RelationNew, session_id, sync: Arc<WikiMaps>| async move {
                sync.create_relation(relation).await.map_err(custom)?;

                let user = sync.authenticate(session_id).await.map_err(custom)?;
                let page = sync.home(user).await.map_err(custom)?;

                Ok::<_, Rejection>(warp::reply::json(&page))
            },
        );

    let login = warp::path!("login")
        .and(warp::post())
        .and(warp::body::form::<Credentials>())
        .and(sync.clone())
        .and_then(move |credentials: Credentials, sync: Arc<WikiMaps>| async move {
            // success and failure both land back on the home page; only
            // success carries a session cookie
            match sync.login(credentials).await {
                Ok(session_id) => {
                    let cookie = session_cookie(&session_id, secure);

                    Ok::<_, Rejection>(
                        warp::reply::with_header(
                            warp::redirect::see_other(Uri::from_static("/")),
                            "set-cookie",
                            cookie.to_string(),
                        )
                        .into_response(),
                    )
                }
                Err(Error::Unauthorized) => {
                    Ok(warp::redirect::see_other(Uri::from_static("/")).into_response())
                }
                Err(e) => Err(custom(e)),
            }
        });

    let register = warp::path!("register")
        .and(warp::post())
        .and(warp::body::form::<Registration>())
        .and(sync.clone())
        .and_then(|registration: Registration, sync: Arc<WikiMaps>| async move {
            sync.register(registration).await.map_err(custom)?;

            // 307 re-posts the submitted credentials to /login
            Ok::<_, Rejection>(warp::redirect::temporary(Uri::from_static("/login")))
        });

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(session.clone())
        .and(sync.clone())
        .and_then(
            move |session_id: Option<SessionId>, sync: Arc<WikiMaps>| async move {
                if let Some(ref session_id) = session_id {
                    sync.logout(session_id).await.map_err(custom)?;
                }

                Ok::<_, Rejection>(warp::reply::with_header(
                    warp::redirect::see_other(Uri::from_static("/")),
                    "set-cookie",
                    removal_cookie(secure).to_string(),
                ))
            },
        );

    let profile = warp::path!("profile")
        .and(warp::get())
        .and(session.clone())
        .and(sync.clone())
        .and_then(|session_id, sync: Arc<WikiMaps>| async move {
            match sync.authenticate(session_id).await.map_err(custom)? {
                Some(user) => {
                    Ok::<_, Rejection>(warp::reply::json(&ProfilePage { user }).into_response())
                }
                None => Ok(warp::redirect::see_other(Uri::from_static("/")).into_response()),
            }
        });

    let routes = home
        .or(contributions)
        .or(favourites)
        .or(users)
        .or(maps)
        .or(points)
        .or(relations)
        .or(login)
        .or(register)
        .or(logout)
        .or(profile)
        .recover(handle_rejection)
        .with(warp::trace::request());

    warp::serve(routes).run(addr).await;
}

fn custom(err: Error) -> Rejection {
    warp::reject::custom(err)
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let status = if let Some(e) = err.find::<Error>() {
        (*e).into()
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
    {
        Error::BadRequest.into()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok(warp::reply::with_status(warp::reply(), status))
}

fn session_cookie(session_id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .build()
}

fn removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = session_cookie(&SessionId::new(), secure);
    cookie.make_removal();
    cookie
}
