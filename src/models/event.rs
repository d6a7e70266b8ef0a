//! Event data models for streamwarden
//!
//! This module defines what one call of the broker poll primitive can return.
//! The set of outcomes is closed, so it is modelled as an enum and dispatched
//! with `match` rather than by inspecting types at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name prefix reserved for broker-internal topics (`__consumer_offsets`, `_schemas`)
pub const INTERNAL_TOPIC_PREFIX: &str = "_";

/// Check whether a topic name is reserved for broker internals
pub fn is_internal_topic(name: &str) -> bool {
    name.starts_with(INTERNAL_TOPIC_PREFIX)
}

/// A single message header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Header key
    pub key: String,

    /// Header value, absent for null headers
    pub value: Option<Vec<u8>>,
}

impl MessageHeader {
    /// Create a header with a value
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Create a header without a value
    pub fn null(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Header value as lossy UTF-8, for logging
    pub fn value_lossy(&self) -> String {
        self.value
            .as_deref()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for MessageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.key, self.value_lossy())
    }
}

/// A data message as read from the broker
///
/// Messages are owned copies detached from the client's buffers, so they
/// can outlive the poll call that produced them. The core never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedMessage {
    /// Source topic
    pub topic: String,

    /// Source partition
    pub partition: i32,

    /// Partition-local offset
    pub offset: i64,

    /// Message key
    pub key: Option<Vec<u8>>,

    /// Message value
    pub payload: Option<Vec<u8>>,

    /// Message headers, in broker order
    pub headers: Vec<MessageHeader>,

    /// Broker or producer timestamp in milliseconds since the epoch
    pub timestamp_ms: Option<i64>,
}

impl ConsumedMessage {
    /// Create a message with no key, payload or headers
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: None,
            headers: Vec::new(),
            timestamp_ms: None,
        }
    }

    /// Set the key
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the payload
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Append a header
    pub fn with_header(mut self, header: MessageHeader) -> Self {
        self.headers.push(header);
        self
    }

    /// Key as lossy UTF-8
    pub fn key_lossy(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }

    /// Payload as lossy UTF-8
    pub fn payload_lossy(&self) -> String {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default()
    }

    /// Look up the first header with the given key
    pub fn header(&self, key: &str) -> Option<&MessageHeader> {
        self.headers.iter().find(|h| h.key == key)
    }
}

/// One outcome of a bounded poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A data message
    Message(ConsumedMessage),

    /// The consumer reached the current end of a partition
    PartitionEnd {
        topic: String,
        partition: i32,
        offset: i64,
    },

    /// The client reported an error
    TransportError {
        code: String,
        description: String,
        fatal: bool,
    },

    /// The poll budget elapsed without an event
    Empty,
}

impl Event {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::PartitionEnd { .. } => "partition_end",
            Event::TransportError { .. } => "transport_error",
            Event::Empty => "empty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_topic_detection() {
        assert!(is_internal_topic("_schemas"));
        assert!(is_internal_topic("__consumer_offsets"));
        assert!(!is_internal_topic("orders"));
        assert!(!is_internal_topic("orders_v2"));
    }

    #[test]
    fn test_consumed_message_builder() {
        let message = ConsumedMessage::new("orders", 0, 5)
            .with_key("42")
            .with_payload(r#"{"id":42}"#)
            .with_header(MessageHeader::new("message_number", "42"));

        assert_eq!(message.key_lossy(), "42");
        assert_eq!(message.payload_lossy(), r#"{"id":42}"#);
        assert_eq!(
            message.header("message_number").map(MessageHeader::value_lossy),
            Some("42".to_string())
        );
        assert!(message.header("missing").is_none());
    }

    #[test]
    fn test_header_display() {
        assert_eq!(
            MessageHeader::new("timestamp", "2024-01-15T10:30:00Z").to_string(),
            "timestamp=\"2024-01-15T10:30:00Z\""
        );
        assert_eq!(MessageHeader::null("trace").to_string(), "trace=\"\"");
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::Empty.kind(), "empty");
        assert_eq!(
            Event::Message(ConsumedMessage::new("orders", 0, 1)).kind(),
            "message"
        );
        assert_eq!(
            Event::PartitionEnd {
                topic: "orders".into(),
                partition: 0,
                offset: 7
            }
            .kind(),
            "partition_end"
        );
    }
}
