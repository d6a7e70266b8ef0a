//! Data models for streamwarden
//!
//! This module contains the broker-neutral types that flow through the
//! consumption core and the confirmed producer: polled events, outgoing
//! messages, delivery reports, and the sample payload used by the producer
//! program.

pub mod delivery;
pub mod error;
pub mod event;
pub mod sample;

// Re-export commonly used types
pub use delivery::{DeliveryFailure, DeliveryOutcome, DeliveryReport, OutgoingMessage};
pub use error::HandlerError;
pub use event::{is_internal_topic, ConsumedMessage, Event, MessageHeader, INTERNAL_TOPIC_PREFIX};
pub use sample::SampleUser;
