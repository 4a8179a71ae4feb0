use std::result;

use log::{debug, error, info, trace};
use warp::http;

use crate::auth::{Credentials, PwHash, Registration, SessionId};
use crate::backend::{Backend, FindError};
use crate::home::HomePage;
use crate::map::{Map, MapNew, MapSummary};
use crate::point::{Point, PointNew};
use crate::relation::{FavouriteToggle, RelationNew, UserMapRelation};
use crate::user::User;

pub struct WikiMaps {
    backend: Backend,
    api_key: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Internal,
    Unauthorized,
    BadRequest,
    NotFound,
}

pub type Result<T> = result::Result<T, Error>;

impl Into<http::StatusCode> for Error {
    fn into(self) -> http::StatusCode {
        match self {
            Self::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => http::StatusCode::UNAUTHORIZED,
            Self::BadRequest => http::StatusCode::BAD_REQUEST,
            Self::NotFound => http::StatusCode::NOT_FOUND,
        }
    }
}

impl warp::reject::Reject for Error {}

impl WikiMaps {
    pub fn new(backend: Backend, api_key: Option<String>) -> Self {
        Self { backend, api_key }
    }

    /// Creates the user unless the name is already taken, in which case
    /// the registration is ignored. Returns whether a row was inserted.
    pub async fn register(&self, registration: Registration) -> Result<bool> {
        let Registration {
            username,
            email,
            password,
        } = registration;

        let pwhash = PwHash::new(&password);

        let created = self
            .backend
            .create_user(&username, &email, pwhash.as_str())
            .await
            .map_err(|()| Error::Internal)?;

        if created {
            info!("registered user {username}");
        } else {
            info!("registration for existing user {username} ignored");
        }

        Ok(created)
    }

    pub async fn login(&self, credentials: Credentials) -> Result<SessionId> {
        let Credentials { username, password } = credentials;

        let user = self.backend.find_user(&username).await.map_err(|e| {
            if matches!(e, FindError::NotFound) {
                error!("rejecting non-existant user {username}");
                Error::Unauthorized
            } else {
                error!("couldn't authenticate user {username}: {e:?}");
                Error::Internal
            }
        })?;

        if !PwHash::from(user.password_hash.clone()).matches(&password) {
            error!("wrong password for user {username}");
            return Err(Error::Unauthorized);
        }

        let session_id = SessionId::new();
        let session_id_str = session_id.to_string();

        if !self
            .backend
            .update_session(user.id, Some(&session_id_str))
            .await
        {
            error!("couldn't login user {username}");
            return Err(Error::Internal);
        }

        info!("{username} login: new session created");
        Ok(session_id)
    }

    /// Resolves the session cookie to a user. An absent or stale session
    /// is an anonymous visitor, not an error.
    pub async fn authenticate(&self, session_id: Option<SessionId>) -> Result<Option<User>> {
        let Some(session_id) = session_id else {
            return Ok(None);
        };

        let session_str = session_id.to_string();

        let mut users = self
            .backend
            .users_with_session(&session_str)
            .await
            .map_err(|()| Error::Internal)?;

        match users.len() {
            0 => {
                debug!("no user for session {session_id}, treating as anonymous");
                Ok(None)
            }
            1 => {
                debug!("found user by session");
                Ok(users.pop())
            }
            _ => {
                error!("multiple users found for session {session_id}");
                Err(Error::Internal)
            }
        }
    }

    pub async fn logout(&self, session_id: &SessionId) -> Result<()> {
        info!("logout for session {session_id}");

        self.backend
            .clear_session(&session_id.to_string())
            .await
            .then(|| ())
            .ok_or(Error::Internal)
    }

    pub async fn home(&self, user: Option<User>) -> Result<HomePage> {
        let user = user.unwrap_or_else(User::guest);

        let favourites = self
            .backend
            .favourite_map_ids(user.id)
            .await
            .map_err(|()| Error::Internal)?;

        trace!("rendering home for user {}, {} favourites", user.id, favourites.len());

        Ok(HomePage {
            api_key: self.api_key.clone(),
            user,
            favourites,
        })
    }

    pub async fn toggle_favourite(&self, toggle: FavouriteToggle) -> Result<i64> {
        let FavouriteToggle {
            user_id,
            map_id,
            state,
        } = toggle;

        let id = self
            .backend
            .upsert_favourite(user_id, map_id, state)
            .await
            .map_err(|()| Error::Internal)?;

        info!("favourite={state} for user {user_id} on map {map_id}");
        Ok(id)
    }

    pub async fn contributions(&self, user_id: i64) -> Result<Vec<MapSummary>> {
        self.backend
            .contributions(user_id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn favourites(&self, user_id: i64) -> Result<Vec<MapSummary>> {
        self.backend
            .favourites(user_id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        self.backend.users().await.map_err(|()| Error::Internal)
    }

    pub async fn maps(&self) -> Result<Vec<Map>> {
        self.backend.maps().await.map_err(|()| Error::Internal)
    }

    pub async fn map(&self, map_id: i64) -> Result<Map> {
        self.backend
            .map(map_id)
            .await
            .map_err(|()| Error::Internal)?
            .ok_or(Error::NotFound)
    }

    pub async fn create_map(&self, map: MapNew) -> Result<i64> {
        let id = self
            .backend
            .create_map(&map)
            .await
            .map_err(|()| Error::Internal)?;

        info!("user {} created map {id}: {}", map.creator_id, map.title);
        Ok(id)
    }

    pub async fn relations_for_user(&self, user_id: i64) -> Result<Vec<UserMapRelation>> {
        self.backend
            .relations_for_user(user_id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn create_relation(&self, relation: RelationNew) -> Result<i64> {
        let id = self
            .backend
            .create_relation(&relation)
            .await
            .map_err(|()| Error::Internal)?;

        info!(
            "relation {id} for user {} on map {}",
            relation.user_id, relation.map_id
        );
        Ok(id)
    }

    pub async fn points_for_map(&self, map_id: i64) -> Result<Vec<Point>> {
        self.backend
            .points_for_map(map_id)
            .await
            .map_err(|()| Error::Internal)
    }

    pub async fn create_point(&self, point: PointNew) -> Result<i64> {
        let id = self
            .backend
            .create_point(&point)
            .await
            .map_err(|()| Error::Internal)?;

        info!("point {id} added to map {}", point.map_id);
        Ok(id)
    }

    pub async fn update_point(&self, point_id: i64, point: PointNew) -> Result<i64> {
        self.backend
            .update_point(point_id, &point)
            .await
            .map_err(|()| Error::Internal)?
            .ok_or(Error::NotFound)
    }

    pub async fn delete_point(&self, point_id: i64) -> Result<()> {
        self.backend
            .delete_point(point_id)
            .await
            .map_err(|()| Error::Internal)?;

        info!("deleted point {point_id}");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::backend;

    async fn create_wikimaps() -> WikiMaps {
        let db = backend::test::create_db().await;
        WikiMaps::new(Backend(db), Some("test-api-key".into()))
    }

    fn registration(name: &str, password: &str) -> Registration {
        Registration {
            username: name.into(),
            email: format!("{name}@example.com"),
            password: password.into(),
        }
    }

    fn credentials(name: &str, password: &str) -> Credentials {
        Credentials {
            username: name.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn login_roundtrip() {
        let wikimaps = create_wikimaps().await;

        assert!(wikimaps
            .register(registration("alice", "pw123"))
            .await
            .unwrap());

        // serialize: login stores the session token
        let session_id = wikimaps
            .login(credentials("alice", "pw123"))
            .await
            .unwrap();

        // deserialize: the token resolves back to the same user
        let user = wikimaps
            .authenticate(Some(session_id))
            .await
            .unwrap()
            .expect("session should resolve to a user");

        let stored = wikimaps.backend.find_user("alice").await.unwrap();
        assert_eq!(user.id, stored.id);
        assert_eq!(user.name, "alice");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let wikimaps = create_wikimaps().await;

        wikimaps
            .register(registration("alice", "pw123"))
            .await
            .unwrap();

        assert!(matches!(
            wikimaps.login(credentials("alice", "other")).await,
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            wikimaps.login(credentials("bob", "pw123")).await,
            Err(Error::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_is_ignored() {
        let wikimaps = create_wikimaps().await;

        assert!(wikimaps
            .register(registration("alice", "pw123"))
            .await
            .unwrap());
        assert!(!wikimaps
            .register(registration("alice", "other"))
            .await
            .unwrap());

        let users = wikimaps.users().await.unwrap();
        assert_eq!(
            users.iter().filter(|u| u.name == "alice").count(),
            1,
            "expected exactly one alice row"
        );

        // the original password still opens the account
        wikimaps
            .login(credentials("alice", "pw123"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stale_session_is_anonymous() {
        let wikimaps = create_wikimaps().await;

        let user = wikimaps.authenticate(Some(SessionId::new())).await.unwrap();
        assert!(user.is_none());

        let user = wikimaps.authenticate(None).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn logout_destroys_session() {
        let wikimaps = create_wikimaps().await;

        wikimaps
            .register(registration("alice", "pw123"))
            .await
            .unwrap();
        let session_id = wikimaps
            .login(credentials("alice", "pw123"))
            .await
            .unwrap();

        wikimaps.logout(&session_id).await.unwrap();

        let user = wikimaps.authenticate(Some(session_id)).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn favourite_toggle_inserts_then_updates() {
        let wikimaps = create_wikimaps().await;

        let toggle = |state| FavouriteToggle {
            user_id: 1,
            map_id: 5,
            state,
        };

        // no relation row yet: the toggle creates one
        let id = wikimaps.toggle_favourite(toggle(true)).await.unwrap();

        let relation = wikimaps.backend.relation(1, 5).await.unwrap().unwrap();
        assert_eq!(relation.id, id);
        assert!(relation.favourite);
        assert!(!relation.contribution);

        // idempotent: same state again leaves the single row in place
        let again = wikimaps.toggle_favourite(toggle(true)).await.unwrap();
        assert_eq!(again, id);
        assert_eq!(wikimaps.relations_for_user(1).await.unwrap().len(), 1);

        // flipping the state updates in place
        let flipped = wikimaps.toggle_favourite(toggle(false)).await.unwrap();
        assert_eq!(flipped, id);

        let relation = wikimaps.backend.relation(1, 5).await.unwrap().unwrap();
        assert!(!relation.favourite);
        assert!(!relation.contribution);
        assert_eq!(wikimaps.relations_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn toggle_preserves_contribution() {
        let wikimaps = create_wikimaps().await;

        wikimaps
            .create_relation(RelationNew {
                user_id: 1,
                map_id: 2,
                favourite: false,
                contribution: true,
            })
            .await
            .unwrap();

        wikimaps
            .toggle_favourite(FavouriteToggle {
                user_id: 1,
                map_id: 2,
                state: true,
            })
            .await
            .unwrap();

        let relation = wikimaps.backend.relation(1, 2).await.unwrap().unwrap();
        assert!(relation.favourite);
        assert!(relation.contribution, "toggle must not clear contribution");
        assert_eq!(wikimaps.relations_for_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn anonymous_home_uses_guest_sentinel() {
        let wikimaps = create_wikimaps().await;

        // a favourite attributed to the guest user (id 0)
        wikimaps
            .create_relation(RelationNew {
                user_id: 0,
                map_id: 9,
                favourite: true,
                contribution: false,
            })
            .await
            .unwrap();

        let page = wikimaps.home(None).await.unwrap();

        assert_eq!(page.user.id, 0);
        assert_eq!(page.user.name, "Guest");
        assert_eq!(page.user.email, "guest@guest.com");
        assert_eq!(page.api_key.as_deref(), Some("test-api-key"));
        assert_eq!(page.favourites, vec![9]);
    }

    #[tokio::test]
    async fn home_lists_user_favourites() {
        let wikimaps = create_wikimaps().await;

        wikimaps
            .register(registration("alice", "pw123"))
            .await
            .unwrap();
        let session_id = wikimaps
            .login(credentials("alice", "pw123"))
            .await
            .unwrap();
        let user = wikimaps
            .authenticate(Some(session_id))
            .await
            .unwrap()
            .unwrap();

        let map_id = wikimaps
            .create_map(MapNew {
                creator_id: user.id,
                title: "Coffee spots".into(),
                latitude: 49.28,
                longitude: -123.12,
            })
            .await
            .unwrap();

        wikimaps
            .toggle_favourite(FavouriteToggle {
                user_id: user.id,
                map_id,
                state: true,
            })
            .await
            .unwrap();

        let page = wikimaps.home(Some(user.clone())).await.unwrap();
        assert_eq!(page.user.id, user.id);
        assert_eq!(page.favourites, vec![map_id]);
    }

    #[tokio::test]
    async fn contribution_and_favourite_listings() {
        let wikimaps = create_wikimaps().await;

        let first = wikimaps
            .create_map(MapNew {
                creator_id: 1,
                title: "Street art".into(),
                latitude: 49.26,
                longitude: -123.10,
            })
            .await
            .unwrap();
        let second = wikimaps
            .create_map(MapNew {
                creator_id: 1,
                title: "Food trucks".into(),
                latitude: 49.27,
                longitude: -123.11,
            })
            .await
            .unwrap();

        wikimaps
            .create_relation(RelationNew {
                user_id: 1,
                map_id: first,
                favourite: true,
                contribution: false,
            })
            .await
            .unwrap();
        wikimaps
            .create_relation(RelationNew {
                user_id: 1,
                map_id: second,
                favourite: false,
                contribution: true,
            })
            .await
            .unwrap();

        let favourites = wikimaps.favourites(1).await.unwrap();
        assert_eq!(favourites.len(), 1);
        assert_eq!(favourites[0].id, first);
        assert_eq!(favourites[0].title, "Street art");

        let contributions = wikimaps.contributions(1).await.unwrap();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].id, second);
        assert_eq!(contributions[0].title, "Food trucks");

        // /maps/:user_id sees both relation rows
        assert_eq!(wikimaps.relations_for_user(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn map_lookup() {
        let wikimaps = create_wikimaps().await;

        let id = wikimaps
            .create_map(MapNew {
                creator_id: 7,
                title: "Viewpoints".into(),
                latitude: 49.3,
                longitude: -123.0,
            })
            .await
            .unwrap();

        let map = wikimaps.map(id).await.unwrap();
        assert_eq!(map.creator_id, 7);
        assert_eq!(map.title, "Viewpoints");

        assert!(matches!(wikimaps.map(id + 1).await, Err(Error::NotFound)));
        assert_eq!(wikimaps.maps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn point_lifecycle() {
        let wikimaps = create_wikimaps().await;

        let map_id = wikimaps
            .create_map(MapNew {
                creator_id: 1,
                title: "Murals".into(),
                latitude: 49.28,
                longitude: -123.12,
            })
            .await
            .unwrap();

        let point = |title: &str| PointNew {
            title: title.into(),
            description: "east side".into(),
            image: None,
            latitude: 49.281,
            longitude: -123.121,
            map_id,
            user_id: 1,
        };

        let id = wikimaps.create_point(point("Whale mural")).await.unwrap();

        let points = wikimaps.points_for_map(map_id).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].title, "Whale mural");

        let updated = wikimaps
            .update_point(id, point("Orca mural"))
            .await
            .unwrap();
        assert_eq!(updated, id);

        let points = wikimaps.points_for_map(map_id).await.unwrap();
        assert_eq!(points[0].title, "Orca mural");

        wikimaps.delete_point(id).await.unwrap();
        assert!(wikimaps.points_for_map(map_id).await.unwrap().is_empty());

        assert!(matches!(
            wikimaps.update_point(id, point("gone")).await,
            Err(Error::NotFound)
        ));
    }
}
