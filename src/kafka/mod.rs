//! Kafka integration module
//!
//! rdkafka-backed implementations of the broker seams:
//! - [`KafkaAdmin`]: metadata queries and topic deletion
//! - [`KafkaEventSource`]: blocking poll consumer with partition EOF events
//! - [`KafkaMessageSink`]: future producer resolving one delivery channel per message

mod admin;
mod config;
mod consumer;
mod producer;

pub use admin::KafkaAdmin;
pub use config::KafkaConfig;
pub use consumer::KafkaEventSource;
pub use producer::KafkaMessageSink;

use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;

/// Name of the librdkafka error code carried by a client error, for logging
///
/// Client errors without a code are named after their variant.
pub(crate) fn error_code_name(error: &KafkaError) -> String {
    if let Some(code) = error.rdkafka_error_code() {
        return format!("{:?}", code);
    }

    let name = match error {
        KafkaError::AdminOp(_) => "AdminOp",
        KafkaError::AdminOpCreation(_) => "AdminOpCreation",
        KafkaError::Canceled => "Canceled",
        KafkaError::ClientConfig(..) => "ClientConfig",
        KafkaError::ClientCreation(_) => "ClientCreation",
        KafkaError::NoMessageReceived => "NoMessageReceived",
        KafkaError::Nul(_) => "Nul",
        KafkaError::PartitionEOF(_) => "PartitionEOF",
        KafkaError::PauseResume(_) => "PauseResume",
        KafkaError::Seek(_) => "Seek",
        KafkaError::Subscription(_) => "Subscription",
        _ => "Unknown",
    };
    name.to_string()
}

/// Whether a librdkafka code means a request ran out of time
pub(crate) fn is_timeout_code(code: RDKafkaErrorCode) -> bool {
    matches!(
        code,
        RDKafkaErrorCode::OperationTimedOut
            | RDKafkaErrorCode::RequestTimedOut
            | RDKafkaErrorCode::MessageTimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_name() {
        let error = KafkaError::MessageConsumption(RDKafkaErrorCode::BrokerTransportFailure);
        assert_eq!(error_code_name(&error), "BrokerTransportFailure");
    }

    #[test]
    fn test_error_code_name_without_code_uses_variant() {
        assert_eq!(error_code_name(&KafkaError::PartitionEOF(3)), "PartitionEOF");
        assert_eq!(error_code_name(&KafkaError::Canceled), "Canceled");
        assert_eq!(
            error_code_name(&KafkaError::ClientCreation("bad config".to_string())),
            "ClientCreation"
        );
    }

    #[test]
    fn test_timeout_codes() {
        assert!(is_timeout_code(RDKafkaErrorCode::RequestTimedOut));
        assert!(is_timeout_code(RDKafkaErrorCode::OperationTimedOut));
        assert!(!is_timeout_code(RDKafkaErrorCode::UnknownTopicOrPartition));
    }
}
