//! # Errors
//!
//! Error taxonomy for remote store access and for the sync/rollback core.

use thiserror::Error;

/// Errors reported by a [`crate::provider::ParameterStore`]
///
/// `NotFound` is an expected outcome (it drives `Create` classification) and
/// is never logged as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("parameter not found: {0}")]
    NotFound(String),

    #[error("parameter already exists: {0}")]
    AlreadyExists(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<StoreError> },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Throttling-class errors are the only ones worth retrying
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(self, StoreError::Throttled(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors that terminate a whole sync or rollback invocation
///
/// Per-parameter failures never show up here; they are collected into the
/// `errors` list of the operation result instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no rollback history: nothing was saved by a previous put, or the snapshot expired")]
    NoRollbackHistory,

    #[error("rollback snapshot was captured for region '{snapshot}' but the target region is '{target}'")]
    RegionMismatch { snapshot: String, target: String },

    #[error("remote store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to read confirmation: {0}")]
    Confirmation(#[from] std::io::Error),
}
