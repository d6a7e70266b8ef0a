//! streamwarden library
//!
//! Topic-following Kafka consumer, confirmed producer and guarded topic
//! administration. The binaries in `src/bin` and `src/main.rs` are thin
//! wrappers over the modules exposed here.

pub mod admin;
pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod models;
pub mod producer;
pub mod shutdown;
pub mod test_utils;
pub mod topics;

// Re-export commonly used types at the crate root
pub use config::{Config, LoggingConfig, RuntimeConfig};
pub use error::{Error, Result};

pub use admin::{AdminGate, Confirmer, DeletionReport, StdinConfirmer};
pub use broker::{BrokerAdmin, EventSource, MessageSink, TopicDeletion, TopicMetadata};
pub use consumer::{ConsumptionLoop, ConsumptionSummary, LoggingHandler, MessageHandler, StopReason};
pub use kafka::{KafkaAdmin, KafkaConfig, KafkaEventSource, KafkaMessageSink};
pub use producer::ProduceConfirmer;
pub use shutdown::{ActivityExit, ShutdownCoordinator, ShutdownState};
pub use topics::{RefreshRoutine, TopicRegistry};

// Re-export model types
pub use models::{
    ConsumedMessage, DeliveryReport, Event, HandlerError, MessageHeader, OutgoingMessage,
    SampleUser,
};
