//! Error types for Pegasus
//!
//! All errors in the crate are converted to `AppError`.
//! `AppError::kind` gives a short, stable label for metrics and logs.

use std::sync::Arc;

use thiserror::Error;

/// Crate-wide error type
///
/// This enum represents all possible errors that can occur while
/// reading the local cache, talking to the ILIAS installation or
/// manipulating offline content on disk.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested row does not exist
    #[error("Resource not found")]
    NotFound,

    /// Input rejected before any I/O happened
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transport-level HTTP failure
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The ILIAS installation answered, but not with what we expected
    #[error("Remote error: {0}")]
    Remote(String),

    /// Offline storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Archive could not be read or extracted
    #[error("Archive error: {0}")]
    Archive(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Error of a coalesced load, delivered to every waiter
    #[error("{0}")]
    Shared(Arc<AppError>),
}

impl AppError {
    /// Short label used for the error metric
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Remote(_) => "remote",
            AppError::Storage(_) => "storage",
            AppError::Archive(_) => "archive",
            AppError::Io(_) => "io",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
            AppError::Shared(inner) => inner.kind(),
        }
    }

    /// Whether this error (or the shared error it wraps) is `NotFound`
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::NotFound => true,
            AppError::Shared(inner) => inner.is_not_found(),
            _ => false,
        }
    }

    /// Record this error in the error metric and hand it back
    pub fn record(self, operation: &str) -> Self {
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL
            .with_label_values(&[self.kind(), operation])
            .inc();
        self
    }
}

impl From<Arc<AppError>> for AppError {
    fn from(err: Arc<AppError>) -> Self {
        AppError::Shared(err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::Archive(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
