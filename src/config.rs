//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub profile: ProfileConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8000)
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Upper bound on pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Profile freshness window in seconds (default: 300)
    pub profile_ttl: u64,
    /// Maximum cached profiles before eviction (default: 100000)
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.profile_ttl)
    }
}

/// Profile defaults applied to incoming sightings
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Language used when a sighting carries none (default: "ru")
    pub default_language: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_directives(&self) -> String {
        format!("miniapp_profile={},tower_http=debug", self.level.trim())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (MINIAPP_PROFILE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("database.path", "users.db")?
            .set_default("database.max_connections", 5)?
            .set_default("cache.profile_ttl", 300)?
            .set_default("cache.max_capacity", 100_000)?
            .set_default("profile.default_language", "ru")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("MINIAPP_PROFILE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.cache.profile_ttl == 0 {
            return Err(crate::error::AppError::Config(
                "cache.profile_ttl must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(crate::error::AppError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.profile.default_language.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "profile.default_language must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
