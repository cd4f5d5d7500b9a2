//! SQLite database operations
//!
//! All profile persistence goes through this module.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Instant;

use super::models::*;
use crate::error::AppError;
use crate::metrics::observe_db_query;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

// Rows written before `created_at` had a default may hold NULL.
macro_rules! profile_columns {
    () => {
        "user_id, username, custom_username, first_name, last_name, language_code, \
         avatar_url, COALESCE(created_at, CURRENT_TIMESTAMP) AS created_at"
    };
}

const SELECT_PROFILE: &str = concat!(
    "SELECT ",
    profile_columns!(),
    " FROM users WHERE user_id = ?"
);

const UPSERT_OBSERVATION: &str = concat!(
    r#"
    INSERT INTO users (user_id, username, first_name, last_name, language_code)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(user_id) DO UPDATE SET
        username = excluded.username,
        first_name = excluded.first_name,
        last_name = excluded.last_name,
        language_code = excluded.language_code
    RETURNING "#,
    profile_columns!()
);

const SET_CUSTOM_USERNAME: &str = concat!(
    r#"
    INSERT INTO users (user_id, custom_username)
    VALUES (?, ?)
    ON CONFLICT(user_id) DO UPDATE SET
        custom_username = excluded.custom_username
    RETURNING "#,
    profile_columns!()
);

/// Add `custom_username` to stores created before the column existed.
///
/// Idempotent: does nothing once the column is present.
async fn ensure_custom_username_column(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    let columns = sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info('users')")
        .fetch_all(pool)
        .await?;

    if columns.iter().any(|column| column == "custom_username") {
        return Ok(());
    }

    sqlx::query("ALTER TABLE users ADD COLUMN custom_username TEXT")
        .execute(pool)
        .await?;

    tracing::info!("Added custom_username column to existing users table");
    Ok(())
}

/// Database connection pool wrapper.
///
/// Every write is a single upsert statement, so SQLite's writer lock keeps
/// concurrent writes to the same row from losing each other's fields.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with_options(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit pool size.
    pub async fn connect_with_options(path: &Path, max_connections: u32) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("cache_size", "10000")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;
        ensure_custom_username_column(&pool).await?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Get stored profile by user id
    ///
    /// # Returns
    /// The profile or None if the user was never seen
    pub async fn get_profile(&self, user_id: i64) -> Result<Option<ProfileRecord>, AppError> {
        let started = Instant::now();
        let profile = sqlx::query_as::<_, ProfileRecord>(SELECT_PROFILE)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        observe_db_query("get_profile", started.elapsed());

        Ok(profile)
    }

    /// Record a sighting of the user
    ///
    /// Overwrites the observed username, names and language. Leaves
    /// `avatar_url`, `custom_username` and `created_at` as they were.
    ///
    /// # Returns
    /// The merged record as stored
    pub async fn upsert_observation(
        &self,
        user_id: i64,
        observation: &ProfileObservation,
    ) -> Result<ProfileRecord, AppError> {
        let started = Instant::now();
        let profile = sqlx::query_as::<_, ProfileRecord>(UPSERT_OBSERVATION)
            .bind(user_id)
            .bind(&observation.username)
            .bind(&observation.first_name)
            .bind(&observation.last_name)
            .bind(&observation.language_code)
            .fetch_one(&self.pool)
            .await?;
        observe_db_query("upsert_observation", started.elapsed());

        tracing::debug!(
            user_id,
            observed = ?profile.observed_username,
            custom = ?profile.custom_username,
            "Stored profile observation"
        );

        Ok(profile)
    }

    /// Set the user-chosen username
    ///
    /// Creates a minimal row holding only the id and custom username when the
    /// user is unknown; otherwise touches `custom_username` alone.
    pub async fn set_custom_username(
        &self,
        user_id: i64,
        custom_username: &str,
    ) -> Result<ProfileRecord, AppError> {
        let started = Instant::now();
        let profile = sqlx::query_as::<_, ProfileRecord>(SET_CUSTOM_USERNAME)
            .bind(user_id)
            .bind(custom_username)
            .fetch_one(&self.pool)
            .await?;
        observe_db_query("set_custom_username", started.elapsed());

        Ok(profile)
    }

    /// Set the avatar URL for an existing user
    ///
    /// # Returns
    /// `true` if updated, `false` if no matching row exists.
    pub async fn set_avatar_url(&self, user_id: i64, avatar_url: &str) -> Result<bool, AppError> {
        let started = Instant::now();
        let result = sqlx::query("UPDATE users SET avatar_url = ? WHERE user_id = ?")
            .bind(avatar_url)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        observe_db_query("set_avatar_url", started.elapsed());

        Ok(result.rows_affected() == 1)
    }

    /// Count stored profiles
    pub async fn count_profiles(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Close the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
