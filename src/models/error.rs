//! Handler error type
//!
//! Message handlers report failures with this type instead of the crate-wide
//! error so they stay independent of the broker plumbing.

use thiserror::Error;

/// Failure raised by a message handler for a single message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable reason
    pub message: String,
}

impl HandlerError {
    /// Create a new handler error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::new(format!("Payload is not valid JSON: {}", err))
    }
}
