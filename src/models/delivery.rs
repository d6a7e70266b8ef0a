//! Outgoing messages and delivery reports

use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::MessageHeader;

/// A message to publish; the partition is always chosen by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Destination topic
    pub topic: String,

    /// Optional key
    pub key: Option<Vec<u8>>,

    /// Optional value
    pub payload: Option<Vec<u8>>,

    /// Headers, in order
    pub headers: Vec<MessageHeader>,
}

impl OutgoingMessage {
    /// Create an empty message for a topic
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload: None,
            headers: Vec::new(),
        }
    }

    /// Set the key
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the value
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Replace the headers
    pub fn with_headers(mut self, headers: Vec<MessageHeader>) -> Self {
        self.headers = headers;
        self
    }
}

/// Successful delivery of one produced message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    /// Topic the message landed in
    pub topic: String,

    /// Partition assigned by the broker
    pub partition: i32,

    /// Offset assigned by the broker
    pub offset: i64,
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// Failed delivery of one produced message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    /// Topic the message was sent to
    pub topic: String,

    /// Reason reported by the client
    pub reason: String,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery to '{}' failed: {}", self.topic, self.reason)
    }
}

/// What the per-call reply channel carries, exactly once
pub type DeliveryOutcome = std::result::Result<DeliveryReport, DeliveryFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_message_builder() {
        let message = OutgoingMessage::new("orders")
            .with_key("1")
            .with_payload("hello")
            .with_headers(vec![MessageHeader::new("message_number", "1")]);

        assert_eq!(message.topic, "orders");
        assert_eq!(message.key.as_deref(), Some(&b"1"[..]));
        assert_eq!(message.payload.as_deref(), Some(&b"hello"[..]));
        assert_eq!(message.headers.len(), 1);
    }

    #[test]
    fn test_delivery_display() {
        let report = DeliveryReport {
            topic: "orders".to_string(),
            partition: 2,
            offset: 17,
        };
        assert_eq!(report.to_string(), "orders[2]@17");

        let failure = DeliveryFailure {
            topic: "orders".to_string(),
            reason: "Message timed out".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "delivery to 'orders' failed: Message timed out"
        );
    }
}
