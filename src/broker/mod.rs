//! Broker seams
//!
//! The core never talks to the Kafka client directly. It goes through three
//! narrow traits, one per role:
//! - [`BrokerAdmin`]: metadata queries and topic deletion
//! - [`EventSource`]: subscription and the blocking poll primitive
//! - [`MessageSink`]: produce with a per-call delivery channel
//!
//! The rdkafka implementations live in [`crate::kafka`]; in-memory doubles
//! live in [`crate::test_utils`].

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::models::{DeliveryOutcome, Event, OutgoingMessage};

/// Broker-neutral description of one topic from a metadata response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    /// Topic name
    pub name: String,

    /// Number of partitions
    pub partitions: usize,

    /// Per-topic error reported by the broker (e.g. unknown topic)
    pub error: Option<String>,
}

impl TopicMetadata {
    /// Create a healthy descriptor
    pub fn new(name: impl Into<String>, partitions: usize) -> Self {
        Self {
            name: name.into(),
            partitions,
            error: None,
        }
    }

    /// Create a descriptor carrying a broker error
    pub fn with_error(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 0,
            error: Some(error.into()),
        }
    }
}

/// Per-topic outcome of a delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDeletion {
    /// Topic the result refers to
    pub topic: String,

    /// `Err` carries the broker-reported reason
    pub result: std::result::Result<(), String>,
}

impl TopicDeletion {
    /// Successful deletion
    pub fn deleted(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            result: Ok(()),
        }
    }

    /// Rejected deletion
    pub fn rejected(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            result: Err(reason.into()),
        }
    }
}

/// Administrative access to the broker
#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    /// Fetch metadata for one topic, or for all topics when `topic` is `None`
    ///
    /// Fails with `Error::Metadata` when the broker is unreachable or the
    /// request exceeds `timeout`.
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<TopicMetadata>>;

    /// Delete topics, returning one result per requested topic
    ///
    /// Fails with `Error::DeleteTimeout` when the request exceeds `timeout`.
    async fn delete_topics(&self, topics: &[String], timeout: Duration)
        -> Result<Vec<TopicDeletion>>;
}

/// Consumer side of the broker connection
///
/// Calls block the current thread. A source is owned by exactly one
/// consumption loop and never shared.
pub trait EventSource: Send {
    /// Replace the current subscription with `topics`
    fn subscribe(&mut self, topics: &[String]) -> Result<()>;

    /// Wait up to `timeout` for one event
    fn poll(&mut self, timeout: Duration) -> Event;

    /// Release the connection; further polls return `Event::Empty`
    fn close(&mut self);
}

/// Producer side of the broker connection
pub trait MessageSink: Send + Sync {
    /// Queue a message for delivery
    ///
    /// Returns the receiving half of a channel that resolves exactly once
    /// with this message's delivery outcome. Fails with
    /// `Error::ProduceSubmit` when the message cannot be queued.
    fn submit(&self, message: OutgoingMessage) -> Result<oneshot::Receiver<DeliveryOutcome>>;

    /// Wait up to `timeout` for queued messages to be delivered
    fn flush(&self, timeout: Duration) -> Result<()>;
}
