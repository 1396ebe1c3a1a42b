//! Error types for the Trellis engine.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while decoding a response buffer.
///
/// These are protocol-level failures. Server-reported GraphQL errors are not
/// represented here; they travel in [`crate::GraphQLResponseError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The buffer has no recognizable `data` / `errors` structure.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The value at the decode path is missing, null, or not a valid `T`.
    #[error("failed to decode value at '{path}': {reason}")]
    Decode { path: String, reason: String },
}

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`crate::Transport`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
    /// Hint for callers deciding whether to retry. The engine never retries.
    pub retryable: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Error surfaced by list operations.
///
/// Always carries a short title, a recovery suggestion, and optionally the
/// underlying error. Callers can reach the underlying value with
/// [`CoreError::underlying_as`].
#[derive(Debug, Error, Clone)]
#[error("{title}")]
pub struct CoreError {
    pub title: String,
    pub recovery_suggestion: String,
    #[source]
    pub underlying: Option<Arc<dyn StdError + Send + Sync>>,
}

impl CoreError {
    pub fn new(title: impl Into<String>, recovery_suggestion: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            recovery_suggestion: recovery_suggestion.into(),
            underlying: None,
        }
    }

    /// Create a list operation error wrapping its cause.
    pub fn list_operation<E>(
        title: impl Into<String>,
        recovery_suggestion: impl Into<String>,
        underlying: E,
    ) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            title: title.into(),
            recovery_suggestion: recovery_suggestion.into(),
            underlying: Some(Arc::new(underlying)),
        }
    }

    /// Downcast the underlying error to a concrete type.
    pub fn underlying_as<E: StdError + 'static>(&self) -> Option<&E> {
        self.underlying.as_deref()?.downcast_ref::<E>()
    }
}
