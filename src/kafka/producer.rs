//! Future producer with one delivery channel per message

use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::KafkaConfig;
use crate::broker::MessageSink;
use crate::error::{Error, Result};
use crate::models::{DeliveryFailure, DeliveryOutcome, DeliveryReport, OutgoingMessage};

/// Message sink backed by an rdkafka `FutureProducer`
#[derive(Clone)]
pub struct KafkaMessageSink {
    /// Kafka producer instance
    producer: FutureProducer,
}

impl KafkaMessageSink {
    /// Create a new producer
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = config
            .build_producer_config()
            .create()
            .map_err(|e| Error::kafka(format!("Failed to create Kafka producer: {}", e)))?;

        Ok(Self { producer })
    }
}

impl MessageSink for KafkaMessageSink {
    fn submit(&self, message: OutgoingMessage) -> Result<oneshot::Receiver<DeliveryOutcome>> {
        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for header in &message.headers {
            headers = headers.insert(Header {
                key: &header.key,
                value: header.value.as_deref(),
            });
        }

        let mut record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&message.topic).headers(headers);
        if let Some(key) = message.key.as_deref() {
            record = record.key(key);
        }
        if let Some(payload) = message.payload.as_deref() {
            record = record.payload(payload);
        }

        // Enqueue only; a full queue fails here instead of blocking.
        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| Error::ProduceSubmit(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let topic = message.topic;

        tokio::spawn(async move {
            let outcome = match delivery.await {
                Ok(Ok(delivery)) => Ok(DeliveryReport {
                    topic,
                    partition: delivery.partition,
                    offset: delivery.offset,
                }),
                Ok(Err((kafka_error, _))) => Err(DeliveryFailure {
                    topic,
                    reason: kafka_error.to_string(),
                }),
                Err(_) => Err(DeliveryFailure {
                    topic,
                    reason: "Producer dropped the delivery callback".to_string(),
                }),
            };

            if tx.send(outcome).is_err() {
                debug!("Delivery report arrived after the caller stopped waiting");
            }
        });

        Ok(rx)
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout).map_err(|e| {
            warn!(error = %e, "Producer flush did not complete");
            Error::kafka(format!("Failed to flush producer: {}", e))
        })
    }
}
