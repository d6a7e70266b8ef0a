//! Blocking poll consumer backed by rdkafka

use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;
use tracing::{debug, info};

use super::{error_code_name, KafkaConfig};
use crate::broker::EventSource;
use crate::error::{Error, Result};
use crate::models::{ConsumedMessage, Event, MessageHeader};

/// Event source that polls a `BaseConsumer`
pub struct KafkaEventSource {
    /// `None` once closed
    consumer: Option<BaseConsumer>,
}

impl KafkaEventSource {
    /// Create a new consumer (not yet subscribed)
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: BaseConsumer = config
            .build_consumer_config()
            .create()
            .map_err(|e| Error::kafka(format!("Failed to create Kafka consumer: {}", e)))?;

        Ok(Self {
            consumer: Some(consumer),
        })
    }

    /// Resolve the topic and position of a partition that reached its end
    ///
    /// Best effort: the EOF error only carries the partition number, so the
    /// topic is looked up in the consumer's current positions.
    fn locate_partition_end(consumer: &BaseConsumer, partition: i32) -> (String, i64) {
        match consumer.position() {
            Ok(positions) => partition_end_in(&positions, partition),
            Err(e) => {
                debug!(error = %e, "Could not read consumer positions");
                (String::new(), -1)
            },
        }
    }

    fn classify_error(consumer: &BaseConsumer, error: KafkaError) -> Event {
        let code = error.rdkafka_error_code();
        let fatal =
            code == Some(RDKafkaErrorCode::Fatal) || consumer.client().fatal_error().is_some();

        Event::TransportError {
            code: error_code_name(&error),
            description: error.to_string(),
            fatal,
        }
    }
}

/// Topic and offset of the only assigned partition numbered `partition`
///
/// When several topics share that partition number the end cannot be
/// attributed, and the topic is left empty with offset -1.
fn partition_end_in(positions: &TopicPartitionList, partition: i32) -> (String, i64) {
    let elements = positions.elements();
    let mut matching = elements.iter().filter(|element| element.partition() == partition);

    match (matching.next(), matching.next()) {
        (Some(element), None) => {
            let offset = match element.offset() {
                Offset::Offset(offset) => offset,
                _ => -1,
            };
            (element.topic().to_string(), offset)
        },
        _ => (String::new(), -1),
    }
}

/// Copy a borrowed message out of the client's buffers
fn detach(message: &BorrowedMessage<'_>) -> ConsumedMessage {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| MessageHeader {
                    key: header.key.to_string(),
                    value: header.value.map(<[u8]>::to_vec),
                })
                .collect()
        })
        .unwrap_or_default();

    ConsumedMessage {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec),
        headers,
        timestamp_ms: message.timestamp().to_millis(),
    }
}

impl EventSource for KafkaEventSource {
    fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let consumer = self
            .consumer
            .as_ref()
            .ok_or_else(|| Error::subscription("Consumer is closed"))?;

        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&names)
            .map_err(|e| Error::subscription(format!("Failed to subscribe to topics: {}", e)))
    }

    fn poll(&mut self, timeout: Duration) -> Event {
        let Some(consumer) = self.consumer.as_ref() else {
            return Event::Empty;
        };

        match consumer.poll(timeout) {
            None => Event::Empty,
            Some(Ok(message)) => Event::Message(detach(&message)),
            Some(Err(KafkaError::PartitionEOF(partition))) => {
                let (topic, offset) = Self::locate_partition_end(consumer, partition);
                Event::PartitionEnd {
                    topic,
                    partition,
                    offset,
                }
            },
            Some(Err(error)) => Self::classify_error(consumer, error),
        }
    }

    fn close(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            info!("Kafka consumer closed");
        }
    }
}

impl Drop for KafkaEventSource {
    fn drop(&mut self) {
        self.close();
    }
}
