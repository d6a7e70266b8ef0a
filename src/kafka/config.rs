//! Kafka configuration module

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kafka configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    #[serde(default = "default_bootstrap_urls")]
    #[envconfig(from = "KAFKA_BOOTSTRAP_URLS", default = "localhost:29092")]
    pub bootstrap_urls: String,

    /// Consumer group ID
    #[serde(default = "default_consumer_group")]
    #[envconfig(from = "KAFKA_CONSUMER_GROUP", default = "streamwarden")]
    pub consumer_group: String,

    /// Schema registry URL (accepted, not used for serialization)
    #[serde(default = "default_schema_registry_url")]
    #[envconfig(from = "KAFKA_SR_URL", default = "http://localhost:8081")]
    pub schema_registry_url: String,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "6000")]
    pub session_timeout_ms: u32,

    /// Where to start when the group has no committed offset (earliest, latest)
    #[serde(default = "default_auto_offset_reset")]
    #[envconfig(from = "KAFKA_AUTO_OFFSET_RESET", default = "earliest")]
    pub auto_offset_reset: String,

    /// Metadata request timeout in milliseconds
    #[serde(default = "default_metadata_timeout")]
    #[envconfig(from = "KAFKA_METADATA_TIMEOUT_MS", default = "5000")]
    pub metadata_timeout_ms: u64,

    /// Delete-topics request timeout in milliseconds
    #[serde(default = "default_delete_timeout")]
    #[envconfig(from = "KAFKA_DELETE_TIMEOUT_MS", default = "5000")]
    pub delete_timeout_ms: u64,

    /// Budget of a single poll call in milliseconds
    #[serde(default = "default_poll_timeout")]
    #[envconfig(from = "KAFKA_POLL_TIMEOUT_MS", default = "100")]
    pub poll_timeout_ms: u64,

    /// Maximum wait for one delivery report in milliseconds
    #[serde(default = "default_delivery_timeout")]
    #[envconfig(from = "KAFKA_DELIVERY_TIMEOUT_MS", default = "30000")]
    pub delivery_timeout_ms: u64,

    /// Interval between topic refreshes in seconds
    #[serde(default = "default_refresh_interval")]
    #[envconfig(from = "TOPIC_REFRESH_INTERVAL_SECS", default = "5")]
    pub refresh_interval_secs: u64,

    /// Resubscribe the consumer when the refreshed topic set changes
    #[serde(default = "default_resubscribe_on_change")]
    #[envconfig(from = "KAFKA_RESUBSCRIBE_ON_CHANGE", default = "false")]
    pub resubscribe_on_change: bool,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_urls: default_bootstrap_urls(),
            consumer_group: default_consumer_group(),
            schema_registry_url: default_schema_registry_url(),
            session_timeout_ms: default_session_timeout(),
            auto_offset_reset: default_auto_offset_reset(),
            metadata_timeout_ms: default_metadata_timeout(),
            delete_timeout_ms: default_delete_timeout(),
            poll_timeout_ms: default_poll_timeout(),
            delivery_timeout_ms: default_delivery_timeout(),
            refresh_interval_secs: default_refresh_interval(),
            resubscribe_on_change: default_resubscribe_on_change(),
        }
    }
}

impl KafkaConfig {
    /// Create a new KafkaConfig from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        <Self as envconfig::Envconfig>::init_from_env()
    }

    /// Get brokers as a vector
    pub fn brokers_list(&self) -> Vec<String> {
        self.bootstrap_urls
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get metadata timeout as Duration
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    /// Get delete timeout as Duration
    pub fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.delete_timeout_ms)
    }

    /// Get poll budget as Duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Get delivery timeout as Duration
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Get refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Build rdkafka consumer configuration
    ///
    /// Partition EOF events are enabled so the consumption loop can report
    /// when it has caught up with a partition.
    pub fn build_consumer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.bootstrap_urls)
            .set("group.id", &self.consumer_group)
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.partition.eof", "true");

        config
    }

    /// Build rdkafka producer configuration
    pub fn build_producer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.bootstrap_urls)
            .set("message.timeout.ms", self.delivery_timeout_ms.to_string());

        config
    }

    /// Build rdkafka configuration for metadata and admin clients
    pub fn build_admin_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        // The metadata client is a consumer under the hood; give it its own
        // group so it never joins the streaming consumer's group.
        config
            .set("bootstrap.servers", &self.bootstrap_urls)
            .set("group.id", format!("{}-admin", self.consumer_group))
            .set("session.timeout.ms", self.session_timeout_ms.to_string());

        config
    }
}

// Default value functions
fn default_bootstrap_urls() -> String {
    "localhost:29092".to_string()
}

fn default_consumer_group() -> String {
    "streamwarden".to_string()
}

fn default_schema_registry_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_session_timeout() -> u32 {
    6000
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_metadata_timeout() -> u64 {
    5000
}

fn default_delete_timeout() -> u64 {
    5000
}

fn default_poll_timeout() -> u64 {
    100
}

fn default_delivery_timeout() -> u64 {
    30000
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_resubscribe_on_change() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KafkaConfig::default();
        assert_eq!(config.bootstrap_urls, "localhost:29092");
        assert_eq!(config.consumer_group, "streamwarden");
        assert_eq!(config.schema_registry_url, "http://localhost:8081");
        assert_eq!(config.auto_offset_reset, "earliest");
        assert!(!config.resubscribe_on_change);
    }

    #[test]
    fn test_duration_conversions() {
        let config = KafkaConfig::default();
        assert_eq!(config.metadata_timeout(), Duration::from_secs(5));
        assert_eq!(config.delete_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_timeout(), Duration::from_millis(100));
        assert_eq!(config.delivery_timeout(), Duration::from_secs(30));
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_brokers_list() {
        let config = KafkaConfig {
            bootstrap_urls: "broker1:9092, broker2:9092,,broker3:9092".to_string(),
            ..KafkaConfig::default()
        };

        assert_eq!(
            config.brokers_list(),
            vec!["broker1:9092", "broker2:9092", "broker3:9092"]
        );
    }

    #[test]
    fn test_client_configs() {
        let config = KafkaConfig::default();

        let consumer = config.build_consumer_config();
        assert_eq!(consumer.get("group.id"), Some("streamwarden"));
        assert_eq!(consumer.get("enable.partition.eof"), Some("true"));
        assert_eq!(consumer.get("session.timeout.ms"), Some("6000"));

        let admin = config.build_admin_config();
        assert_eq!(admin.get("group.id"), Some("streamwarden-admin"));

        let producer = config.build_producer_config();
        assert_eq!(producer.get("bootstrap.servers"), Some("localhost:29092"));
    }
}
