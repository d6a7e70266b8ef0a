//! Topic discovery
//!
//! The registry holds the current topic set; the refresh routine keeps it
//! in step with the broker.

pub mod refresh;
pub mod registry;

pub use refresh::RefreshRoutine;
pub use registry::TopicRegistry;
