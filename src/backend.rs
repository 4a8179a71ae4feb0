#[derive(Debug)]
pub enum FindError {
    NotFound,
    Internal,
}

mod backend_sql;
pub use backend_sql::*;
