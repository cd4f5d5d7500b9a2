//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database and cache operations.

mod profile;

pub use profile::ProfileService;
