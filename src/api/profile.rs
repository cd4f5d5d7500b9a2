//! Profile endpoints
//!
//! - GET  /api/profile                    (sighting: reconcile and return)
//! - GET  /api/user/:user_id              (stored profile)
//! - GET  /api/user/:user_id/username     (display username)
//! - GET  /api/user/:user_id/avatar       (avatar URL)
//! - POST /api/username                   (rename)
//!
//! Storage failures never surface as error pages here: lookups answer with
//! `null` fields and the rename endpoint answers `{"ok": false}`.

use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::Json,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::data::{ProfileObservation, ProfileResponse};
use crate::error::AppError;
use crate::metrics::record_error;

const MISSING_RENAME_FIELDS: &str = "Missing user_id or username";

/// Create profile router
pub fn profile_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(sighting))
        .route("/user/:user_id", get(get_profile))
        .route("/user/:user_id/username", get(get_username))
        .route("/user/:user_id/avatar", get(get_avatar))
        .route("/username", post(update_username))
}

/// Query parameters the Mini App is opened with
#[derive(Debug, Deserialize)]
struct SightingQuery {
    user_id: Option<String>,
    username: Option<String>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    lang: Option<String>,
}

/// GET /api/profile
///
/// Records the sighting and returns the resolved profile, or `null` when the
/// store is unavailable.
async fn sighting(
    State(state): State<AppState>,
    Query(query): Query<SightingQuery>,
) -> Result<Json<Option<ProfileResponse>>, AppError> {
    let user_id = query
        .user_id
        .as_deref()
        .ok_or_else(|| AppError::Validation("user_id is required".to_string()))
        .and_then(parse_user_id)?;

    let observation = ProfileObservation {
        username: query.username,
        first_name: query.first_name,
        last_name: query.last_name,
        language_code: query
            .lang
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| state.config.profile.default_language.clone()),
    };

    match state.profiles.reconcile(user_id, observation, Utc::now()).await {
        Ok(record) => Ok(Json(Some(ProfileResponse::from(&record)))),
        Err(error) => {
            record_error(&error);
            tracing::error!(user_id, %error, "Failed to save and load user profile");
            Ok(Json(None))
        }
    }
}

/// GET /api/user/:user_id
async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<Option<ProfileResponse>> {
    match state.profiles.get_profile(user_id).await {
        Ok(profile) => Json(profile.as_ref().map(ProfileResponse::from)),
        Err(error) => {
            record_error(&error);
            tracing::error!(user_id, %error, "Failed to load user profile");
            Json(None)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsernameResponse {
    pub username: Option<String>,
}

/// GET /api/user/:user_id/username
async fn get_username(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<UsernameResponse> {
    let username = state
        .profiles
        .display_username(user_id)
        .await
        .unwrap_or_else(|error| {
            record_error(&error);
            tracing::error!(user_id, %error, "Failed to resolve username");
            None
        });

    Json(UsernameResponse { username })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar_url: Option<String>,
}

/// GET /api/user/:user_id/avatar
async fn get_avatar(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Json<AvatarResponse> {
    let avatar_url = state
        .profiles
        .avatar_url(user_id)
        .await
        .unwrap_or_else(|error| {
            record_error(&error);
            tracing::error!(user_id, %error, "Failed to load avatar");
            None
        });

    Json(AvatarResponse { avatar_url })
}

/// Rename request; `user_id` may arrive as a number or a numeric string
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub user_id: Option<serde_json::Value>,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenameResponse {
    fn success(username: String) -> Self {
        Self {
            ok: true,
            username: Some(username),
            error: None,
        }
    }

    fn failure(error: &str) -> Self {
        Self {
            ok: false,
            username: None,
            error: Some(error.to_string()),
        }
    }
}

/// POST /api/username
///
/// Always answers 200 with `{"ok": ...}`.
async fn update_username(
    State(state): State<AppState>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Json<RenameResponse> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(%rejection, "Rejected rename request body");
            return Json(RenameResponse::failure(MISSING_RENAME_FIELDS));
        }
    };

    let raw_user_id = request.user_id.filter(|value| match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        _ => true,
    });
    let username = request
        .username
        .filter(|username| !username.trim().is_empty());

    let (Some(raw_user_id), Some(username)) = (raw_user_id, username) else {
        tracing::warn!("Rename request without user_id or username");
        return Json(RenameResponse::failure(MISSING_RENAME_FIELDS));
    };

    let user_id = match json_user_id(&raw_user_id) {
        Some(user_id) => user_id,
        None => {
            tracing::warn!(user_id = %raw_user_id, "Invalid user_id in rename request");
            return Json(RenameResponse::failure("Invalid user_id"));
        }
    };

    match state
        .profiles
        .set_custom_username(user_id, &username, Utc::now())
        .await
    {
        Ok(record) => {
            let effective = record
                .display_username()
                .map(str::to_string)
                .unwrap_or(username);
            Json(RenameResponse::success(effective))
        }
        Err(error @ AppError::Validation(_)) => {
            record_error(&error);
            Json(RenameResponse::failure(MISSING_RENAME_FIELDS))
        }
        Err(error) => {
            record_error(&error);
            tracing::error!(user_id, %error, "Failed to update username");
            Json(RenameResponse::failure("Internal server error"))
        }
    }
}

fn parse_user_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::Validation("Invalid user_id".to_string()))
}

fn json_user_id(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(raw) => parse_user_id(raw).ok(),
        _ => None,
    }
}
