//! miniapp-profile - Profile backend for a Telegram Mini App
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Sighting, lookup and rename endpoints (JSON)             │
//! │  - Metrics                                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Cache/database reconciliation                            │
//! │  - Custom username renames                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                            │
//! │  - Moka in-memory profile cache                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database and cache layer
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Cache/database reconciliation
    pub profiles: Arc<service::ProfileService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Initialize the profile cache
    /// 3. Wire the profile service
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = Arc::new(
            data::Database::connect_with_options(
                &config.database.path,
                config.database.max_connections,
            )
            .await?,
        );
        let profile_count = db.count_profiles().await?;
        metrics::PROFILES_TOTAL.set(profile_count);
        tracing::info!(profiles = profile_count, "Database connected");

        let profile_cache = Arc::new(data::ProfileCache::new(
            config.cache.freshness_window(),
            config.cache.max_capacity,
        ));
        tracing::info!(
            freshness_secs = config.cache.profile_ttl,
            max_capacity = config.cache.max_capacity,
            "Profile cache initialized"
        );

        let profiles = Arc::new(service::ProfileService::new(db.clone(), profile_cache));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            profiles,
        })
    }
}

/// Build the Axum router with all routes.
///
/// Shared by the binary and integration tests.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::profile_router())
        .merge(api::metrics_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
