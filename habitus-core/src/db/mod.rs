//! Database layer: schema migrations and the repository handle.

pub mod repo;
pub mod schema;

pub use repo::{Database, SearchHit, TurnRecord};
