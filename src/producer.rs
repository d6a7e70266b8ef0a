//! Confirmed production
//!
//! Each publish submits one message and waits for exactly that message's
//! delivery report. The reply channel is created per call, so concurrent
//! publishes can never observe each other's reports.

use std::time::Duration;
use tracing::{debug, error};

use crate::broker::MessageSink;
use crate::error::{Error, Result};
use crate::models::{DeliveryReport, MessageHeader, OutgoingMessage};

/// Publish-and-await front end over a [`MessageSink`]
#[derive(Debug, Clone)]
pub struct ProduceConfirmer<S> {
    sink: S,
    delivery_timeout: Duration,
}

impl<S: MessageSink> ProduceConfirmer<S> {
    /// Create a confirmer that waits at most `delivery_timeout` per message
    pub fn new(sink: S, delivery_timeout: Duration) -> Self {
        Self {
            sink,
            delivery_timeout,
        }
    }

    /// Access the underlying sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Publish one message and wait for its delivery report
    pub async fn publish(
        &self,
        topic: &str,
        key: Option<Vec<u8>>,
        payload: Option<Vec<u8>>,
        headers: Vec<MessageHeader>,
    ) -> Result<DeliveryReport> {
        self.publish_message(OutgoingMessage {
            topic: topic.to_string(),
            key,
            payload,
            headers,
        })
        .await
    }

    /// Publish a prepared message and wait for its delivery report
    ///
    /// Fails with `ProduceSubmit` when the message cannot be queued,
    /// `Delivery` when the broker reports a failure or the report channel
    /// closes without an answer, and `Timeout` when no report arrives within
    /// the delivery timeout.
    pub async fn publish_message(&self, message: OutgoingMessage) -> Result<DeliveryReport> {
        let topic = message.topic.clone();
        let receiver = self.sink.submit(message).map_err(|e| match e {
            Error::ProduceSubmit(_) => e,
            other => Error::ProduceSubmit(other.to_string()),
        })?;

        match tokio::time::timeout(self.delivery_timeout, receiver).await {
            Ok(Ok(Ok(report))) => {
                debug!(
                    topic = %report.topic,
                    partition = report.partition,
                    offset = report.offset,
                    "Message delivered"
                );
                Ok(report)
            },
            Ok(Ok(Err(failure))) => {
                error!(topic = %failure.topic, reason = %failure.reason, "Delivery failed");
                Err(Error::Delivery(failure.to_string()))
            },
            Ok(Err(_)) => {
                error!(topic = %topic, "Delivery report channel closed without a report");
                Err(Error::Delivery(format!(
                    "no delivery report received for topic '{}'",
                    topic
                )))
            },
            Err(_) => {
                error!(
                    topic = %topic,
                    timeout_ms = self.delivery_timeout.as_millis() as u64,
                    "Timed out waiting for delivery report"
                );
                Err(Error::Timeout(format!(
                    "no delivery report for topic '{}' within {:?}",
                    topic, self.delivery_timeout
                )))
            },
        }
    }

    /// Wait for queued messages to be delivered
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.sink.flush(timeout)
    }
}
