//! HTTP request handlers

pub mod admin;
pub mod auth;
pub mod complaints;
pub mod error;
pub mod middleware;
pub mod photos;

pub use admin::*;
pub use auth::*;
pub use complaints::*;
pub use photos::*;

use crate::storage::PhotoStore;
use sqlx::PgPool;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub photos: PhotoStore,
    pub max_photo_size: usize,
    pub session_expiry_hours: i64,
    pub is_production: bool,
    /// Trusted proxy IP prefixes for X-Forwarded-For validation
    pub trusted_proxies: Vec<String>,
}
