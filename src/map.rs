use serde::{Deserialize, Serialize};

use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct Map {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Fields posted when creating a map.
#[derive(Debug, Deserialize)]
pub struct MapNew {
    pub creator_id: i64,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// The id/title pairs the map list panels render.
#[derive(Debug, Serialize, FromRow)]
pub struct MapSummary {
    pub id: i64,
    pub title: String,
}
