//! Error types for licmeter
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

/// Result type alias using MeterError
pub type Result<T> = std::result::Result<T, MeterError>;

/// Unified error type for metering operations
#[derive(Debug, Error)]
pub enum MeterError {
    // Tenant API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    // Snapshot file errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // Transport errors
    #[error("Network error: {0}")]
    Network(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeterError {
    /// Whether a later invocation may succeed without intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            MeterError::Api(ApiError::RateLimited { .. }) => true,
            MeterError::Api(ApiError::Status { status, .. }) => *status >= 500,
            MeterError::Network(_) => true,
            _ => false,
        }
    }
}

/// Tenant API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Rate limited by {url}, gave up after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    #[error("Unexpected response shape from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// Snapshot file errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to write snapshot {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Failed to encode snapshot: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for MeterError {
    fn from(err: serde_json::Error) -> Self {
        MeterError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MeterError {
    fn from(err: std::io::Error) -> Self {
        MeterError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for MeterError {
    fn from(err: anyhow::Error) -> Self {
        MeterError::Internal(err.to_string())
    }
}
