use std::path::{Path, PathBuf};

use sqlx::{migrate::MigrateDatabase, Pool, Sqlite, SqlitePool};

use log::{error, info};

use crate::backend::FindError;
use crate::map::{Map, MapNew, MapSummary};
use crate::point::{Point, PointNew};
use crate::relation::{RelationNew, UserMapRelation};
use crate::user::User;

type Result<T> = std::result::Result<T, ()>;

pub struct Backend(pub Pool<Sqlite>);

fn into_sql(data_dir: &Path, env: &str) -> PathBuf {
    data_dir.join(format!("wikimaps-{env}.sql"))
}

pub async fn init(data_dir: &Path, env: &str) {
    let final_path = format!(
        "sqlite://{}",
        into_sql(data_dir, env).to_str().expect("non utf-8 data")
    );
    match Sqlite::create_database(&final_path).await {
        Ok(()) => {
            info!("Using {}", &final_path);
        }
        Err(e) => {
            let sqlx::Error::Database(db_err) = e else {
                panic!("error creating database: {e}");
            };

            panic!("sql db error: {db_err:?}");
        }
    }
}

impl Backend {
    pub async fn new(data_dir: &Path, env: &str) -> Self {
        let db_pathbuf = into_sql(data_dir, env);
        let db_path = db_pathbuf.to_str().expect("non utf-8 data");
        let pool = match SqlitePool::connect(db_path).await {
            Ok(pool) => pool,
            Err(_err) => {
                init(data_dir, env).await;
                SqlitePool::connect(db_path).await.expect("db connection")
            }
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migration");

        Self(pool)
    }
}

impl Backend {
    pub async fn find_user(&self, name: &str) -> std::result::Result<User, FindError> {
        sqlx::query_as::<_, User>(
            "
            SELECT *
            FROM users
            WHERE name = ?
            ",
        )
        .bind(name)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                FindError::Internal
            }
        })
    }

    /// Inserts a new user, or does nothing if the name is taken.
    /// Returns whether a row was inserted.
    pub async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<bool> {
        sqlx::query(
            "
            INSERT INTO users
            (name, email, password_hash)
            VALUES
            (?, ?, ?)
            ON CONFLICT (name)
            DO NOTHING
            ",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .execute(&self.0)
        .await
        .map(|done| done.rows_affected() > 0)
        .map_err(|e| {
            error!("error inserting user: {e:?}");
        })
    }

    /// session_id: set to None to logout / make NULL
    pub async fn update_session(&self, user_id: i64, session_id: Option<&str>) -> bool {
        sqlx::query(
            "
            UPDATE users
            SET session_id = ?
            WHERE id = ?
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("update session: {e}");
            e
        })
        .is_ok()
    }

    pub async fn clear_session(&self, session_id: &str) -> bool {
        sqlx::query(
            "
            UPDATE users
            SET session_id = NULL
            WHERE session_id = ?
            ",
        )
        .bind(session_id)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("clear session: {e}");
            e
        })
        .is_ok()
    }

    pub async fn users_with_session(&self, session_id: &str) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            "
            SELECT *
            FROM users
            WHERE session_id = ?
            ",
        )
        .bind(session_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query for session {session_id}: {e:?}");
        })
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            "
            SELECT *
            FROM users
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting users: {e:?}");
        })
    }
}

impl Backend {
    pub async fn maps(&self) -> Result<Vec<Map>> {
        sqlx::query_as::<_, Map>(
            "
            SELECT *
            FROM maps
            ",
        )
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting maps: {e:?}");
        })
    }

    pub async fn map(&self, map_id: i64) -> Result<Option<Map>> {
        sqlx::query_as::<_, Map>(
            "
            SELECT *
            FROM maps
            WHERE id = ?
            ",
        )
        .bind(map_id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting map {map_id}: {e:?}");
        })
    }

    pub async fn create_map(&self, map: &MapNew) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO maps
            (creator_id, title, latitude, longitude)
            VALUES
            (?, ?, ?, ?)
            RETURNING id
            ",
        )
        .bind(map.creator_id)
        .bind(&map.title)
        .bind(map.latitude)
        .bind(map.longitude)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting map: {e:?}");
        })
    }

    pub async fn contributions(&self, user_id: i64) -> Result<Vec<MapSummary>> {
        sqlx::query_as::<_, MapSummary>(
            "
            SELECT maps.id AS id, maps.title AS title
            FROM maps
            INNER JOIN users_maps
                ON maps.id = users_maps.map_id
            WHERE users_maps.user_id = ?
                AND users_maps.contribution = TRUE
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting contributions: {e:?}");
        })
    }

    pub async fn favourites(&self, user_id: i64) -> Result<Vec<MapSummary>> {
        sqlx::query_as::<_, MapSummary>(
            "
            SELECT maps.id AS id, maps.title AS title
            FROM maps
            INNER JOIN users_maps
                ON maps.id = users_maps.map_id
            WHERE users_maps.user_id = ?
                AND users_maps.favourite = TRUE
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting favourites: {e:?}");
        })
    }
}

impl Backend {
    /// Sets the favourite flag for (user_id, map_id) as a single atomic
    /// upsert. The insert branch leaves contribution false, the update
    /// branch leaves it untouched. Returns the relation row's id.
    pub async fn upsert_favourite(&self, user_id: i64, map_id: i64, state: bool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO users_maps
            (user_id, map_id, favourite, contribution)
            VALUES
            (?, ?, ?, FALSE)
            ON CONFLICT (user_id, map_id)
            DO
                UPDATE SET
                    favourite = excluded.favourite
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(map_id)
        .bind(state)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error upserting favourite: {e:?}");
        })
    }

    pub async fn create_relation(&self, relation: &RelationNew) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO users_maps
            (user_id, map_id, favourite, contribution)
            VALUES
            (?, ?, ?, ?)
            ON CONFLICT (user_id, map_id)
            DO
                UPDATE SET
                    favourite = excluded.favourite,
                    contribution = excluded.contribution
            RETURNING id
            ",
        )
        .bind(relation.user_id)
        .bind(relation.map_id)
        .bind(relation.favourite)
        .bind(relation.contribution)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting relation: {e:?}");
        })
    }

    pub async fn relations_for_user(&self, user_id: i64) -> Result<Vec<UserMapRelation>> {
        sqlx::query_as::<_, UserMapRelation>(
            "
            SELECT *
            FROM users_maps
            WHERE user_id = ?
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting relations: {e:?}");
        })
    }

    pub async fn relation(&self, user_id: i64, map_id: i64) -> Result<Option<UserMapRelation>> {
        sqlx::query_as::<_, UserMapRelation>(
            "
            SELECT *
            FROM users_maps
            WHERE user_id = ?
                AND map_id = ?
            ",
        )
        .bind(user_id)
        .bind(map_id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting relation: {e:?}");
        })
    }

    pub async fn favourite_map_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "
            SELECT map_id
            FROM users_maps
            WHERE user_id = ?
                AND favourite = TRUE
            ",
        )
        .bind(user_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting favourite map ids: {e:?}");
        })
    }
}

impl Backend {
    pub async fn points_for_map(&self, map_id: i64) -> Result<Vec<Point>> {
        sqlx::query_as::<_, Point>(
            "
            SELECT *
            FROM points
            WHERE map_id = ?
            ",
        )
        .bind(map_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting points: {e:?}");
        })
    }

    pub async fn create_point(&self, point: &PointNew) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO points
            (title, description, image, latitude, longitude, map_id, user_id)
            VALUES
            (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            ",
        )
        .bind(&point.title)
        .bind(&point.description)
        .bind(&point.image)
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(point.map_id)
        .bind(point.user_id)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            error!("error inserting point: {e:?}");
        })
    }

    /// Returns the updated row's id, or None if no such point exists.
    pub async fn update_point(&self, point_id: i64, point: &PointNew) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            "
            UPDATE points
            SET
                title = ?,
                description = ?,
                image = ?,
                latitude = ?,
                longitude = ?,
                map_id = ?,
                user_id = ?
            WHERE id = ?
            RETURNING id
            ",
        )
        .bind(&point.title)
        .bind(&point.description)
        .bind(&point.image)
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(point.map_id)
        .bind(point.user_id)
        .bind(point_id)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error updating point {point_id}: {e:?}");
        })
    }

    pub async fn delete_point(&self, point_id: i64) -> Result<()> {
        sqlx::query(
            "
            DELETE FROM points
            WHERE id = ?
            ",
        )
        .bind(point_id)
        .execute(&self.0)
        .await
        .map(|_| ())
        .map_err(|e| {
            error!("error deleting point {point_id}: {e:?}");
        })
    }
}
