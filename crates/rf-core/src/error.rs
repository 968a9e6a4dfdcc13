//! # AppError
//!
//! Centralized error handling for the Rusty-Forum ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all rf-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// The author id is missing and is not the guest identity.
    #[error("invalid author id")]
    InvalidAuthor,

    /// The reply target is not a well-formed post id.
    #[error("invalid reply target: {0:?}")]
    InvalidReplyTarget(String),

    /// Resource not found (e.g., Post, Topic)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., malformed request body)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A registered filter handler rejected the payload.
    #[error("hook {hook} failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Infrastructure failure surfaced by a port (e.g., store down).
    /// Propagated as-is, never retried.
    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),

    /// Internal failure that is not a port error (e.g., a panicked task).
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidAuthor | AppError::InvalidReplyTarget(_) | AppError::ValidationError(_)
        )
    }
}

/// A specialized Result type for Rusty-Forum logic.
pub type Result<T> = std::result::Result<T, AppError>;
