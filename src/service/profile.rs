//! Profile service
//!
//! Keeps the profile cache and the database in step for each sighting and
//! applies username renames.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::data::{Database, ProfileCache, ProfileObservation, ProfileRecord};
use crate::error::AppError;
use crate::metrics::{PROFILE_RECONCILE_TOTAL, PROFILE_RENAMES_TOTAL};

const WRITE_LOCK_STRIPES: usize = 64;

/// Profile service
pub struct ProfileService {
    db: Arc<Database>,
    cache: Arc<ProfileCache>,
    /// Writes for one user always take the same stripe, so a store write
    /// and the cache refresh that follows it are never interleaved with
    /// another write for that user.
    write_locks: Box<[Mutex<()>]>,
}

impl ProfileService {
    /// Create new profile service
    pub fn new(db: Arc<Database>, cache: Arc<ProfileCache>) -> Self {
        let write_locks = (0..WRITE_LOCK_STRIPES)
            .map(|_| Mutex::new(()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            db,
            cache,
            write_locks,
        }
    }

    /// Record a sighting and return the resolved profile
    ///
    /// A fresh cache entry whose observed attributes match is returned as-is
    /// without touching the database. Any difference in observed attributes
    /// forces a write, even inside the freshness window.
    pub async fn reconcile(
        &self,
        user_id: i64,
        observation: ProfileObservation,
        now: DateTime<Utc>,
    ) -> Result<ProfileRecord, AppError> {
        if let Some(entry) = self.cache.lookup(user_id, now).await {
            if !ProfileCache::is_stale_relative_to(&entry, &observation) {
                PROFILE_RECONCILE_TOTAL
                    .with_label_values(&["cache_hit"])
                    .inc();
                return Ok(entry.record.clone());
            }
            tracing::debug!(user_id, "Observed attributes changed; refreshing profile");
        }

        let _guard = self.write_lock(user_id).lock().await;
        let record = self.db.upsert_observation(user_id, &observation).await?;
        self.cache.put(user_id, record.clone(), now).await;

        PROFILE_RECONCILE_TOTAL.with_label_values(&["stored"]).inc();
        tracing::info!(
            user_id,
            display_username = ?record.display_username(),
            original = ?record.observed_username,
            custom = ?record.custom_username,
            "Updated user profile"
        );

        Ok(record)
    }

    /// Set the user's custom username
    ///
    /// # Errors
    /// `Validation` when the username is blank.
    pub async fn set_custom_username(
        &self,
        user_id: i64,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<ProfileRecord, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username cannot be empty".to_string()));
        }

        let _guard = self.write_lock(user_id).lock().await;
        let record = self.db.set_custom_username(user_id, username).await?;
        self.cache.put(user_id, record.clone(), now).await;

        PROFILE_RENAMES_TOTAL.inc();
        tracing::info!(user_id, custom = %username, "Custom username updated");

        Ok(record)
    }

    /// Get the stored profile
    pub async fn get_profile(&self, user_id: i64) -> Result<Option<ProfileRecord>, AppError> {
        self.db.get_profile(user_id).await
    }

    /// Resolve the username shown for the user
    pub async fn display_username(&self, user_id: i64) -> Result<Option<String>, AppError> {
        Ok(self
            .db
            .get_profile(user_id)
            .await?
            .and_then(|profile| profile.display_username().map(str::to_string)))
    }

    /// Get the stored avatar URL
    pub async fn avatar_url(&self, user_id: i64) -> Result<Option<String>, AppError> {
        Ok(self
            .db
            .get_profile(user_id)
            .await?
            .and_then(|profile| profile.avatar_url))
    }

    fn write_lock(&self, user_id: i64) -> &Mutex<()> {
        let stripe = user_id.rem_euclid(self.write_locks.len() as i64) as usize;
        &self.write_locks[stripe]
    }
}
