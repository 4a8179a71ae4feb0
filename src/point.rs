use serde::{Deserialize, Serialize};

use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct Point {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub map_id: i64,
    pub user_id: i64,
}

/// Fields posted when creating or updating a point.
#[derive(Debug, Deserialize)]
pub struct PointNew {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub map_id: i64,
    pub user_id: i64,
}
