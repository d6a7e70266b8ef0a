//! Metadata and topic deletion through rdkafka

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::types::RDKafkaErrorCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{error_code_name, is_timeout_code, KafkaConfig};
use crate::broker::{BrokerAdmin, TopicDeletion, TopicMetadata};
use crate::error::{Error, Result};

/// Grace added on top of the broker-side operation timeout before giving up locally
const DELETE_GRACE: Duration = Duration::from_secs(1);

/// Administrative client backed by rdkafka
///
/// Metadata goes through a plain `BaseConsumer` (its calls block, so they run
/// on the blocking pool); deletion goes through an `AdminClient`.
pub struct KafkaAdmin {
    metadata_client: Arc<BaseConsumer>,
    admin_client: AdminClient<DefaultClientContext>,
}

impl KafkaAdmin {
    /// Create the metadata and admin clients
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let client_config = config.build_admin_config();

        let metadata_client: BaseConsumer = client_config
            .create()
            .map_err(|e| Error::kafka(format!("Failed to create metadata client: {}", e)))?;

        let admin_client: AdminClient<DefaultClientContext> = client_config
            .create()
            .map_err(|e| Error::kafka(format!("Failed to create admin client: {}", e)))?;

        Ok(Self {
            metadata_client: Arc::new(metadata_client),
            admin_client,
        })
    }
}

#[async_trait]
impl BrokerAdmin for KafkaAdmin {
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<TopicMetadata>> {
        let client = Arc::clone(&self.metadata_client);
        let topic = topic.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let metadata = client
                .fetch_metadata(topic.as_deref(), timeout)
                .map_err(|e| Error::metadata(format!("Failed to fetch metadata: {}", e)))?;

            let topics = metadata
                .topics()
                .iter()
                .map(|t| TopicMetadata {
                    name: t.name().to_string(),
                    partitions: t.partitions().len(),
                    error: t
                        .error()
                        .map(|err| format!("{:?}", RDKafkaErrorCode::from(err))),
                })
                .collect::<Vec<_>>();

            debug!(
                requested = topic.as_deref().unwrap_or("*"),
                returned = topics.len(),
                "Fetched topic metadata"
            );
            Ok(topics)
        })
        .await?
    }

    async fn delete_topics(
        &self,
        topics: &[String],
        timeout: Duration,
    ) -> Result<Vec<TopicDeletion>> {
        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        let opts = AdminOptions::new()
            .operation_timeout(Some(timeout))
            .request_timeout(Some(timeout));

        let request = self.admin_client.delete_topics(&names, &opts);
        let results = match tokio::time::timeout(timeout + DELETE_GRACE, request).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                if e.rdkafka_error_code().is_some_and(is_timeout_code) {
                    return Err(Error::DeleteTimeout(topics.join(",")));
                }
                return Err(Error::broker(
                    topics.join(","),
                    format!("{} ({})", e, error_code_name(&e)),
                ));
            },
            Err(_) => return Err(Error::DeleteTimeout(topics.join(","))),
        };

        let mut deletions = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(topic) => deletions.push(TopicDeletion::deleted(topic)),
                Err((topic, code)) if is_timeout_code(code) => {
                    return Err(Error::DeleteTimeout(topic));
                },
                Err((topic, code)) => {
                    deletions.push(TopicDeletion::rejected(topic, format!("{:?}", code)));
                },
            }
        }

        Ok(deletions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_creation() {
        // Client construction does not contact the broker
        let config = KafkaConfig::default();
        let result = KafkaAdmin::new(&config);
        assert!(result.is_ok());
    }

    // Integration test would require a running Kafka instance
    #[ignore]
    #[tokio::test]
    async fn test_fetch_all_metadata() {
        let admin = KafkaAdmin::new(&KafkaConfig::default()).unwrap();
        let topics = admin.fetch_metadata(None, Duration::from_secs(5)).await;
        assert!(topics.is_ok());
    }
}
