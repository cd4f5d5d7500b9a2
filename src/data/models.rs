//! Data models
//!
//! Rust structs representing stored profiles and the observed attributes
//! that arrive with each sighting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Profile
// =============================================================================

/// One stored profile per Telegram user id
///
/// `observed_username` is the last username the bot reported and maps to the
/// `username` column. `custom_username` is only changed by an explicit rename.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProfileRecord {
    pub user_id: i64,
    #[sqlx(rename = "username")]
    pub observed_username: Option<String>,
    pub custom_username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    /// Externally hosted avatar; never cleared by observation updates
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProfileRecord {
    /// Username shown to users: the custom one when set, else the observed one.
    ///
    /// Empty usernames resolve to None.
    pub fn display_username(&self) -> Option<&str> {
        self.custom_username
            .as_deref()
            .filter(|custom| !custom.is_empty())
            .or(self.observed_username.as_deref())
            .filter(|username| !username.is_empty())
    }
}

/// Attributes reported by the messaging platform on a sighting
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileObservation {
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub language_code: String,
}

impl ProfileObservation {
    /// Whether a stored record already carries exactly these attributes.
    ///
    /// Compares against the observed username, not the display username, so
    /// an upstream rename is noticed even while a custom name masks it.
    pub fn matches(&self, record: &ProfileRecord) -> bool {
        record.observed_username == self.username
            && record.first_name.as_deref().unwrap_or_default() == self.first_name
            && record.last_name.as_deref().unwrap_or_default() == self.last_name
            && record.language_code.as_deref().unwrap_or_default() == self.language_code
    }
}

// =============================================================================
// API shape
// =============================================================================

/// Profile as rendered into pages and returned from lookup endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    /// Resolved display username
    pub username: Option<String>,
    pub original_username: Option<String>,
    pub custom_username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&ProfileRecord> for ProfileResponse {
    fn from(record: &ProfileRecord) -> Self {
        Self {
            user_id: record.user_id,
            username: record.display_username().map(str::to_string),
            original_username: record.observed_username.clone(),
            custom_username: record.custom_username.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            language_code: record.language_code.clone(),
            avatar_url: record.avatar_url.clone(),
        }
    }
}
