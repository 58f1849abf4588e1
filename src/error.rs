//! Error types for the fragment mirror.

use crate::types::AssociationId;
use thiserror::Error;

/// Errors raised by backend drivers
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend item not found: {0}")]
    NotFound(String),

    #[error("Backend item already exists: {0}")]
    AlreadyExists(String),

    #[error("Backend operation '{operation}' failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },

    #[error("Driver '{driver}' does not support {operation}")]
    Unsupported {
        driver: String,
        operation: &'static str,
    },

    #[error("Backend I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BackendError {
    /// True for the driver's "not found" signal, false for every other failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::NotFound(_) => true,
            BackendError::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors surfaced by fragment, reconciliation and controller operations
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Association not found: {0}")]
    AssociationNotFound(AssociationId),

    #[error("Stale fragment: in-memory revision {expected} but backend holds {found}")]
    StaleDocument { expected: String, found: String },

    #[error("Controller holds unpersisted state; refresh before further mutation")]
    RefreshRequired,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Fragment codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl FragmentError {
    /// True when the caller must `refresh()` and retry.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            FragmentError::StaleDocument { .. } | FragmentError::RefreshRequired
        )
    }
}

impl From<config::ConfigError> for FragmentError {
    fn from(err: config::ConfigError) -> Self {
        FragmentError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for FragmentError {
    fn from(err: serde_json::Error) -> Self {
        FragmentError::Codec(err.to_string())
    }
}
