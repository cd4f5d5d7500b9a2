//! In-memory profile cache
//!
//! Volatile and cleared on restart. Uses Moka for concurrent storage and
//! bounded eviction; freshness is decided from each entry's capture time so
//! callers control the clock.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::models::{ProfileObservation, ProfileRecord};
use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, CACHE_SIZE};

const CACHE_NAME: &str = "profile";

/// Cached profile with the moment it was captured
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: ProfileRecord,
    pub captured_at: DateTime<Utc>,
}

/// Profile cache keyed by Telegram user id
pub struct ProfileCache {
    entries: Cache<i64, Arc<CacheEntry>>,
    freshness_window: Duration,
}

impl ProfileCache {
    /// Create new profile cache
    ///
    /// # Arguments
    /// * `freshness_window` - Age after which an entry is no longer trusted
    /// * `max_capacity` - Upper bound on cached users
    pub fn new(freshness_window: Duration, max_capacity: u64) -> Self {
        // Entries past the window are never served, so let Moka drop them.
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(freshness_window)
            .build();

        Self {
            entries,
            freshness_window,
        }
    }

    /// Get a fresh entry for the user
    ///
    /// Returns None when nothing is cached or the entry is at least
    /// `freshness_window` old relative to `now`.
    pub async fn lookup(&self, user_id: i64, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let result = self
            .entries
            .get(&user_id)
            .await
            .filter(|entry| self.is_fresh(entry, now));

        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&[CACHE_NAME]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&[CACHE_NAME]).inc();
        }

        result
    }

    /// Insert or replace the user's entry
    pub async fn put(&self, user_id: i64, record: ProfileRecord, now: DateTime<Utc>) {
        let entry = CacheEntry {
            record,
            captured_at: now,
        };
        self.entries.insert(user_id, Arc::new(entry)).await;

        CACHE_SIZE
            .with_label_values(&[CACHE_NAME])
            .set(self.entries.entry_count() as i64);
    }

    /// Drop the user's entry
    pub async fn invalidate(&self, user_id: i64) {
        self.entries.invalidate(&user_id).await;
    }

    /// Whether the observed attributes differ from what the entry holds
    pub fn is_stale_relative_to(entry: &CacheEntry, observation: &ProfileObservation) -> bool {
        !observation.matches(&entry.record)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // An entry captured "in the future" has age zero.
        let age = (now - entry.captured_at).to_std().unwrap_or_default();
        age < self.freshness_window
    }
}
