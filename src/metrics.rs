//! Prometheus metrics registry and instruments.
//!
//! Instruments work before registration; `init_metrics` only exposes them
//! through the `/metrics` endpoint.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Database Metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("miniapp_profile_db_queries_total", "Total number of database queries"),
        &["operation"]
    ).expect("metric can be created");
    pub static ref DB_QUERY_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "miniapp_profile_db_query_duration_seconds",
            "Database query duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("miniapp_profile_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("miniapp_profile_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("miniapp_profile_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Profile Metrics
    pub static ref PROFILE_RECONCILE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("miniapp_profile_reconcile_total", "Profile sightings by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref PROFILE_RENAMES_TOTAL: IntCounter = IntCounter::new(
        "miniapp_profile_renames_total",
        "Total number of custom username changes"
    ).expect("metric can be created");
    pub static ref PROFILES_TOTAL: IntGauge = IntGauge::new(
        "miniapp_profile_profiles_total",
        "Number of stored profiles"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("miniapp_profile_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(DB_QUERIES_TOTAL.clone()))
            .expect("DB_QUERIES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
            .expect("DB_QUERY_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_SIZE.clone()))
            .expect("CACHE_SIZE can be registered");
        REGISTRY
            .register(Box::new(PROFILE_RECONCILE_TOTAL.clone()))
            .expect("PROFILE_RECONCILE_TOTAL can be registered");
        REGISTRY
            .register(Box::new(PROFILE_RENAMES_TOTAL.clone()))
            .expect("PROFILE_RENAMES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(PROFILES_TOTAL.clone()))
            .expect("PROFILES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record one database operation.
pub fn observe_db_query(operation: &str, elapsed: Duration) {
    DB_QUERIES_TOTAL.with_label_values(&[operation]).inc();
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
}

/// Count an error, including ones a handler turns into a structured answer.
pub fn record_error(error: &crate::error::AppError) {
    ERRORS_TOTAL.with_label_values(&[error.kind()]).inc();
}
