//! Logging module for streamwarden
//!
//! This module configures structured logging using the tracing crate,
//! providing JSON output by default and human-readable text for terminals.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::LoggingConfig;
use crate::error::Result;

/// Initialize the logging system
///
/// - `LOG_TEXT`: human-readable text instead of JSON
/// - `DEBUG`: debug level instead of info
/// - `RUST_LOG`, when set, overrides both levels
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let level = config.level();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("streamwarden={},rdkafka=warn", level)));

    if config.text {
        let formatting_layer = fmt::layer()
            .with_file(config.debug)
            .with_line_number(config.debug)
            .with_target(true)
            .with_writer(std::io::stderr);

        Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .try_init()
            .map_err(|e| {
                crate::error::Error::internal(format!("Failed to initialize tracing: {}", e))
            })?;
    } else {
        let formatting_layer = fmt::layer()
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_target(true)
            .with_span_events(FmtSpan::NONE)
            .with_current_span(true)
            .with_writer(std::io::stderr);

        Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .try_init()
            .map_err(|e| {
                crate::error::Error::internal(format!("Failed to initialize tracing: {}", e))
            })?;
    }

    tracing::info!(level = level, text = config.text, "Logging initialized");

    Ok(())
}

/// Create a span for one consumed Kafka message
#[macro_export]
macro_rules! kafka_span {
    ($topic:expr, $partition:expr, $offset:expr) => {
        tracing::info_span!(
            "kafka_message",
            topic = %$topic,
            partition = $partition,
            offset = $offset,
        )
    };
}

/// Log an error with its kind
#[macro_export]
macro_rules! log_error {
    ($error:expr, $msg:expr) => {
        tracing::error!(
            error = %$error,
            error_type = $error.kind(),
            $msg
        )
    };
    ($error:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::error!(
            error = %$error,
            error_type = $error.kind(),
            $($key = tracing::field::display(&$value),)*
            $msg
        )
    };
}

/// Helper for timing operations
pub struct Timer {
    start: std::time::Instant,
    operation: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(operation: impl Into<String>) -> Self {
        Timer {
            start: std::time::Instant::now(),
            operation: operation.into(),
        }
    }

    /// Stop the timer and log the duration
    pub fn stop(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration.as_millis() >= 10);
    }

    #[test]
    fn test_macros_expand() {
        let span = crate::kafka_span!("orders", 0, 5i64);
        let _entered = span.enter();

        let error = Error::NotFound("orders".to_string());
        crate::log_error!(error, "Failed to delete topic");
        crate::log_error!(error, "Failed to delete topic", topic = "orders");
    }
}
