//! Per-message handlers

use tracing::info;

use crate::models::{ConsumedMessage, HandlerError};

/// Application callback invoked once per consumed message
///
/// Errors are logged by the consumption loop and never stop it; the message
/// is not redelivered.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &ConsumedMessage) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&ConsumedMessage) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, message: &ConsumedMessage) -> Result<(), HandlerError> {
        self(message)
    }
}

/// Default handler: logs every message with its metadata
#[derive(Debug, Clone, Default)]
pub struct LoggingHandler;

impl LoggingHandler {
    pub fn new() -> Self {
        Self
    }
}

impl MessageHandler for LoggingHandler {
    fn handle(&self, message: &ConsumedMessage) -> Result<(), HandlerError> {
        let headers = message
            .headers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        info!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            key = %message.key_lossy(),
            headers = %headers,
            timestamp_ms = ?message.timestamp_ms,
            content = %message.payload_lossy(),
            "Received message"
        );

        Ok(())
    }
}
