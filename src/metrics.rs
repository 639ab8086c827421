//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Database Metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pegasus_db_queries_total", "Total number of database queries"),
        &["operation", "table"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pegasus_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pegasus_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("pegasus_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Object Tree Metrics
    pub static ref DUPLICATES_PRUNED_TOTAL: IntCounter = IntCounter::new(
        "pegasus_duplicates_pruned_total",
        "Total number of duplicate object rows deleted during lookups"
    ).expect("metric can be created");
    pub static ref NEEDS_DOWNLOAD_UPDATES_TOTAL: IntCounter = IntCounter::new(
        "pegasus_needs_download_updates_total",
        "Total number of persisted needs-download flag changes"
    ).expect("metric can be created");
    pub static ref STORAGE_REMOVALS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pegasus_storage_removals_total", "Total number of offline copies removed"),
        &["status"]
    ).expect("metric can be created");

    // Learning Module Metrics
    pub static ref LEARNING_MODULE_LOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pegasus_learning_module_loads_total", "Total number of learning module loads"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref LEARNING_MODULE_STAGE_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "pegasus_learning_module_stage_duration_seconds",
            "Learning module pipeline stage duration in seconds"
        ).buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["stage", "status"]
    ).expect("metric can be created");
    pub static ref BYTES_DOWNLOADED_TOTAL: IntCounter = IntCounter::new(
        "pegasus_bytes_downloaded_total",
        "Total bytes of archives downloaded"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("pegasus_errors_total", "Total number of errors"),
        &["error_type", "operation"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(DB_QUERIES_TOTAL.clone()))
        .expect("DB_QUERIES_TOTAL can be registered");
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
        .register(Box::new(DUPLICATES_PRUNED_TOTAL.clone()))
        .expect("DUPLICATES_PRUNED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(NEEDS_DOWNLOAD_UPDATES_TOTAL.clone()))
        .expect("NEEDS_DOWNLOAD_UPDATES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORAGE_REMOVALS_TOTAL.clone()))
        .expect("STORAGE_REMOVALS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(LEARNING_MODULE_LOADS_TOTAL.clone()))
        .expect("LEARNING_MODULE_LOADS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(LEARNING_MODULE_STAGE_DURATION_SECONDS.clone()))
        .expect("LEARNING_MODULE_STAGE_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(BYTES_DOWNLOADED_TOTAL.clone()))
        .expect("BYTES_DOWNLOADED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Count one database statement.
pub fn observe_db_query(operation: &str, table: &str) {
    DB_QUERIES_TOTAL
        .with_label_values(&[operation, table])
        .inc();
}

/// Record a finished pipeline stage.
pub fn observe_stage(stage: &str, status: &str, elapsed: Duration) {
    LEARNING_MODULE_STAGE_DURATION_SECONDS
        .with_label_values(&[stage, status])
        .observe(elapsed.as_secs_f64());
}

/// Encode the registry in Prometheus text format.
pub fn render() -> Result<String, crate::error::AppError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::error::AppError::Internal(e.into()))?;
    String::from_utf8(buffer).map_err(|e| crate::error::AppError::Internal(e.into()))
}
