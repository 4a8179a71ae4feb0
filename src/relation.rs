use serde::{Deserialize, Serialize};

use sqlx::FromRow;

/// A join-table row linking one user to one map. At most one row exists
/// per (user_id, map_id) pair.
#[derive(Debug, Serialize, FromRow)]
pub struct UserMapRelation {
    pub id: i64,
    pub user_id: i64,
    pub map_id: i64,
    pub favourite: bool,
    pub contribution: bool,
}

/// Fields posted when creating a user-map relation.
#[derive(Debug, Deserialize)]
pub struct RelationNew {
    pub user_id: i64,
    pub map_id: i64,
    pub favourite: bool,
    pub contribution: bool,
}

/// Query string for PUT /favourites.
#[derive(Debug, Deserialize)]
pub struct FavouriteToggle {
    pub user_id: i64,
    pub map_id: i64,
    pub state: bool,
}
