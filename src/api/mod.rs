//! API layer
//!
//! HTTP handlers for:
//! - Profile lookups and renames (JSON)
//! - Metrics (Prometheus)

pub mod metrics;
mod profile;

pub use metrics::metrics_router;
pub use profile::{AvatarResponse, RenameRequest, RenameResponse, UsernameResponse, profile_router};
