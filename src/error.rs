//! Error handling module for streamwarden
//!
//! This module defines the error taxonomy shared by the consumption core,
//! the confirmed producer and the topic administration gate. Every variant
//! maps to one failure class: some are recoverable on the next natural cycle
//! (a refresh tick, a poll iteration), others are fatal to the activity that
//! owns them.

use thiserror::Error;

/// Result type alias for streamwarden operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for streamwarden
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka client construction or usage errors
    #[error("Kafka error: {0}")]
    Kafka(String),

    /// Broker metadata could not be fetched (unreachable or timed out)
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// The consumer could not subscribe to its topic set
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Error reported by the poll primitive
    #[error("Transport error ({code}): {description}")]
    Transport {
        code: String,
        description: String,
        fatal: bool,
    },

    /// Application level failure while handling one message
    #[error("Handler error: {0}")]
    Handler(#[from] crate::models::HandlerError),

    /// The producer refused the message before it was queued
    #[error("Produce submission failed: {0}")]
    ProduceSubmit(String),

    /// The broker reported a failed delivery for a produced message
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// A bounded wait expired
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The requested topic does not exist
    #[error("Topic '{0}' does not exist")]
    NotFound(String),

    /// The delete request did not complete within its timeout
    #[error("Deleting topic '{0}' timed out")]
    DeleteTimeout(String),

    /// The broker rejected an administrative request
    #[error("Broker rejected request for topic '{topic}': {reason}")]
    Broker { topic: String, reason: String },

    /// The operator did not confirm a destructive operation
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a Kafka error
    pub fn kafka<S: Into<String>>(msg: S) -> Self {
        Error::Kafka(msg.into())
    }

    /// Create a metadata error
    pub fn metadata<S: Into<String>>(msg: S) -> Self {
        Error::Metadata(msg.into())
    }

    /// Create a subscription error
    pub fn subscription<S: Into<String>>(msg: S) -> Self {
        Error::Subscription(msg.into())
    }

    /// Create a transport error
    pub fn transport(code: impl Into<String>, description: impl Into<String>, fatal: bool) -> Self {
        Error::Transport {
            code: code.into(),
            description: description.into(),
            fatal,
        }
    }

    /// Create a broker rejection error
    pub fn broker(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Broker {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Check if this error is retried on the next natural cycle
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Metadata(_) | Error::Timeout(_) => true,
            Error::Transport { fatal, .. } => !fatal,
            _ => false,
        }
    }

    /// Check if this error terminates the activity that observed it
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Subscription(_) | Error::Config(_) | Error::Kafka(_) => true,
            Error::Transport { fatal, .. } => *fatal,
            _ => false,
        }
    }

    /// Short machine-readable name, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration_error",
            Error::Kafka(_) => "kafka_error",
            Error::Metadata(_) => "metadata_error",
            Error::Subscription(_) => "subscription_error",
            Error::Transport { .. } => "transport_error",
            Error::Handler(_) => "handler_error",
            Error::ProduceSubmit(_) => "produce_submit_error",
            Error::Delivery(_) => "delivery_error",
            Error::Timeout(_) => "timeout",
            Error::NotFound(_) => "not_found",
            Error::DeleteTimeout(_) => "delete_timeout",
            Error::Broker { .. } => "broker_error",
            Error::Aborted(_) => "aborted",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

/// Convert from anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Convert from envconfig::Error to our Error type
impl From<envconfig::Error> for Error {
    fn from(err: envconfig::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Task failed: {}", err))
    }
}
