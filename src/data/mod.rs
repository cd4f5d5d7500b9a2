//! Data layer module
//!
//! Handles profile persistence and caching:
//! - SQLite database operations
//! - Profile cache (volatile)

mod cache;
mod database;
mod models;

pub use cache::{CacheEntry, ProfileCache};
pub use database::Database;
pub use models::*;
