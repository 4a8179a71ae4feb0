use serde::Serialize;

use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,

    #[serde(skip)]
    pub password_hash: String,

    #[serde(skip)]
    pub session_id: Option<String>,
}

impl User {
    /// Anonymous visitors render with a fixed guest record (id 0), so the
    /// favourites lookup uses the same path for everyone.
    pub fn guest() -> Self {
        Self {
            id: 0,
            name: "Guest".into(),
            email: "guest@guest.com".into(),
            password_hash: "none".into(),
            session_id: None,
        }
    }
}
