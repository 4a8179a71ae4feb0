use serde::Serialize;

use crate::user::User;

/// Template variables for the home page. `favourites` holds the map ids
/// the current (or guest) user has flagged.
#[derive(Debug, Serialize)]
pub struct HomePage {
    pub api_key: Option<String>,
    pub user: User,
    pub favourites: Vec<i64>,
}

/// Template variables for the profile page.
#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub user: User,
}
