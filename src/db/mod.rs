//! Database access

pub mod audit;
pub mod complaints;
pub mod photos;
mod pool;
pub mod users;

pub use pool::{create_pool, run_migrations};
