//! Configuration module for streamwarden
//!
//! This module handles loading and validating configuration from environment
//! variables (and a `.env` file when present), providing strongly-typed
//! configuration structures for the Kafka clients, logging and the runtime.

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
pub use crate::kafka::KafkaConfig;

/// Main configuration structure for streamwarden
#[derive(Debug, Clone, Default, Deserialize, Serialize, Envconfig)]
pub struct Config {
    /// Kafka configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub kafka: KafkaConfig,

    /// Logging configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub logging: LoggingConfig,

    /// Runtime configuration
    #[serde(flatten)]
    #[envconfig(nested)]
    pub runtime: RuntimeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Envconfig)]
pub struct LoggingConfig {
    /// Log at debug level
    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: bool,

    /// Human-readable text output instead of JSON
    #[envconfig(from = "LOG_TEXT", default = "false")]
    pub text: bool,
}

impl LoggingConfig {
    /// Level directive for the crate's own targets
    pub fn level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct RuntimeConfig {
    /// Shutdown timeout in seconds
    #[envconfig(from = "SHUTDOWN_TIMEOUT_SECS", default = "30")]
    pub shutdown_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 30,
        }
    }
}

impl RuntimeConfig {
    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        Config::init_from_env().map_err(Error::from)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers_list().is_empty() {
            return Err(Error::config("Kafka bootstrap URLs cannot be empty"));
        }

        if self.kafka.consumer_group.trim().is_empty() {
            return Err(Error::config("Kafka consumer group cannot be empty"));
        }

        if !matches!(self.kafka.auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(Error::config(format!(
                "Unknown auto offset reset '{}' (expected earliest or latest)",
                self.kafka.auto_offset_reset
            )));
        }

        let timeouts = [
            ("KAFKA_SESSION_TIMEOUT_MS", u64::from(self.kafka.session_timeout_ms)),
            ("KAFKA_METADATA_TIMEOUT_MS", self.kafka.metadata_timeout_ms),
            ("KAFKA_DELETE_TIMEOUT_MS", self.kafka.delete_timeout_ms),
            ("KAFKA_POLL_TIMEOUT_MS", self.kafka.poll_timeout_ms),
            ("KAFKA_DELIVERY_TIMEOUT_MS", self.kafka.delivery_timeout_ms),
            ("TOPIC_REFRESH_INTERVAL_SECS", self.kafka.refresh_interval_secs),
            ("SHUTDOWN_TIMEOUT_SECS", self.runtime.shutdown_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(Error::config(format!("{} must be greater than 0", name)));
        }

        Ok(())
    }

    /// Log configuration
    pub fn log_config(&self) {
        tracing::info!(
            bootstrap_urls = %self.kafka.bootstrap_urls,
            consumer_group = %self.kafka.consumer_group,
            schema_registry_url = %self.kafka.schema_registry_url,
            auto_offset_reset = %self.kafka.auto_offset_reset,
            "Kafka configuration"
        );

        tracing::info!(
            metadata_timeout_ms = self.kafka.metadata_timeout_ms,
            delete_timeout_ms = self.kafka.delete_timeout_ms,
            poll_timeout_ms = self.kafka.poll_timeout_ms,
            delivery_timeout_ms = self.kafka.delivery_timeout_ms,
            refresh_interval_secs = self.kafka.refresh_interval_secs,
            resubscribe_on_change = self.kafka.resubscribe_on_change,
            "Client timing configuration"
        );

        tracing::info!(
            debug = self.logging.debug,
            text = self.logging.text,
            shutdown_timeout_secs = self.runtime.shutdown_timeout_secs,
            "Runtime configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.runtime.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level(), "info");
    }

    #[test]
    fn test_debug_level() {
        let logging = LoggingConfig {
            debug: true,
            text: true,
        };
        assert_eq!(logging.level(), "debug");
    }

    #[test]
    fn test_validate_rejects_empty_brokers() {
        let mut config = Config::default();
        config.kafka.bootstrap_urls = " , ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_offset_reset() {
        let mut config = Config::default();
        config.kafka.auto_offset_reset = "smallest".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = Config::default();
        config.kafka.refresh_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TOPIC_REFRESH_INTERVAL_SECS"));

        let mut config = Config::default();
        config.runtime.shutdown_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_uses_variables() {
        std::env::set_var("KAFKA_CONSUMER_GROUP", "env-group");
        std::env::set_var("KAFKA_RESUBSCRIBE_ON_CHANGE", "true");

        let config = Config::from_env().unwrap();
        assert_eq!(config.kafka.consumer_group, "env-group");
        assert!(config.kafka.resubscribe_on_change);

        std::env::remove_var("KAFKA_CONSUMER_GROUP");
        std::env::remove_var("KAFKA_RESUBSCRIBE_ON_CHANGE");
    }
}
