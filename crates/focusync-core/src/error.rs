//! Core error types for focusync-core.
//!
//! Mirrors the layering of the sync core: persisted queue failures, remote
//! gateway failures (split into transient and permanent), local store
//! failures and configuration failures all roll up into [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persisted queue errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Remote store errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Local entity store errors
    #[error("Local store error: {0}")]
    LocalStore(#[from] LocalStoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading or rewriting a persisted operation list.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to read queue at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write queue at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt queue file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// How a remote failure should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network error, timeout, 5xx, rate limiting. Worth retrying.
    Transient,
    /// Rejected request or undecodable data. Retrying cannot help.
    Permanent,
}

/// Remote store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Remote not configured: {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Classify the failure. 408, 429 and 5xx are retryable, other statuses
    /// are not.
    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::Network(_) => FailureKind::Transient,
            GatewayError::Status { status, .. } => match *status {
                408 | 429 => FailureKind::Transient,
                s if s >= 500 => FailureKind::Transient,
                _ => FailureKind::Permanent,
            },
            GatewayError::InvalidPayload(_) | GatewayError::NotConfigured(_) => {
                FailureKind::Permanent
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => GatewayError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => GatewayError::InvalidPayload(err.to_string()),
            None => GatewayError::Network(err.to_string()),
        }
    }
}

/// Local entity store errors.
#[derive(Error, Debug)]
pub enum LocalStoreError {
    #[error("Failed to persist local records at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt local store: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Local store lock poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
