//! Streaming consumption loop
//!
//! The loop subscribes to the registry's topic set, then polls the event
//! source with a bounded budget until shutdown or a fatal transport error.
//! Every data message goes to the handler exactly once; handler failures are
//! logged and the loop moves on.
//!
//! By default the subscription is taken once, at loop entry, and topics that
//! appear later are not consumed until restart. Enable
//! [`ConsumptionLoop::resubscribe_on_change`] to follow registry changes.

mod handler;

pub use handler::{LoggingHandler, MessageHandler};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::EventSource;
use crate::error::{Error, Result};
use crate::kafka_span;
use crate::models::{ConsumedMessage, Event};
use crate::topics::TopicRegistry;

/// Why the loop stopped
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The shutdown signal fired
    #[default]
    Shutdown,

    /// The event source reported an error flagged fatal
    FatalTransportError { code: String, description: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Shutdown => write!(f, "shutdown requested"),
            StopReason::FatalTransportError { code, description } => {
                write!(f, "fatal transport error ({}): {}", code, description)
            },
        }
    }
}

/// Counters collected over one run of the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumptionSummary {
    pub messages: u64,
    pub handler_errors: u64,
    pub partition_ends: u64,
    pub transport_errors: u64,
    pub resubscriptions: u64,
    pub stop_reason: StopReason,
}

/// Subscribe-then-poll loop over an [`EventSource`]
pub struct ConsumptionLoop<S, H> {
    source: S,
    handler: H,
    registry: Arc<TopicRegistry>,
    poll_timeout: Duration,
    resubscribe_on_change: bool,
}

impl<S, H> ConsumptionLoop<S, H>
where
    S: EventSource + 'static,
    H: MessageHandler + 'static,
{
    /// Create a loop that subscribes once
    pub fn new(source: S, handler: H, registry: Arc<TopicRegistry>, poll_timeout: Duration) -> Self {
        Self {
            source,
            handler,
            registry,
            poll_timeout,
            resubscribe_on_change: false,
        }
    }

    /// Resubscribe whenever the registry's topic set changes
    pub fn resubscribe_on_change(mut self, enabled: bool) -> Self {
        self.resubscribe_on_change = enabled;
        self
    }

    /// Run until `shutdown` fires or a fatal transport error occurs
    ///
    /// Blocks the calling thread. Fails only when the initial subscription
    /// fails. Either that or a fatal transport error cancels `shutdown` so
    /// sibling activities drain too.
    pub fn run(mut self, shutdown: CancellationToken) -> Result<ConsumptionSummary> {
        let topics = self.registry.snapshot();
        let mut subscribed_version = self.registry.version();

        if topics.is_empty() {
            warn!("Subscribing to an empty topic set; no messages will arrive until resubscription");
        }

        if let Err(e) = self.source.subscribe(&topics) {
            error!(error = %e, topics = ?topics, "Failed to subscribe to topics");
            self.source.close();
            shutdown.cancel();
            return Err(e);
        }
        info!(topics = ?topics, "Consumer subscribed");

        let mut summary = ConsumptionSummary::default();

        let stop_reason = loop {
            if shutdown.is_cancelled() {
                break StopReason::Shutdown;
            }

            if self.resubscribe_on_change {
                self.follow_registry(&mut subscribed_version, &mut summary);
            }

            match self.source.poll(self.poll_timeout) {
                Event::Empty => continue,
                Event::Message(message) => self.dispatch(&message, &mut summary),
                Event::PartitionEnd {
                    topic,
                    partition,
                    offset,
                } => {
                    summary.partition_ends += 1;
                    info!(topic = %topic, partition, offset, "Reached end of partition");
                },
                Event::TransportError {
                    code,
                    description,
                    fatal,
                } => {
                    summary.transport_errors += 1;
                    let err = Error::transport(code.as_str(), description.as_str(), fatal);
                    if err.is_fatal() {
                        crate::log_error!(err, "Fatal Kafka error on consume");
                        shutdown.cancel();
                        break StopReason::FatalTransportError { code, description };
                    }
                    crate::log_error!(err, "Kafka error on consume", retryable = err.is_retryable());
                },
            }
        };

        self.source.close();
        summary.stop_reason = stop_reason;

        info!(
            messages = summary.messages,
            handler_errors = summary.handler_errors,
            transport_errors = summary.transport_errors,
            reason = %summary.stop_reason,
            "Consumption loop stopped"
        );
        Ok(summary)
    }

    /// Run on the blocking thread pool
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<Result<ConsumptionSummary>> {
        tokio::task::spawn_blocking(move || self.run(shutdown))
    }

    fn dispatch(&self, message: &ConsumedMessage, summary: &mut ConsumptionSummary) {
        let span = kafka_span!(message.topic.as_str(), message.partition, message.offset);
        let _entered = span.enter();

        summary.messages += 1;
        if let Err(e) = self.handler.handle(message) {
            summary.handler_errors += 1;
            let err = Error::from(e);
            crate::log_error!(err, "Failed to handle message");
        }
    }

    fn follow_registry(&mut self, subscribed_version: &mut u64, summary: &mut ConsumptionSummary) {
        let version = self.registry.version();
        if version == *subscribed_version {
            return;
        }

        let topics = self.registry.snapshot();
        match self.source.subscribe(&topics) {
            Ok(()) => {
                *subscribed_version = version;
                summary.resubscriptions += 1;
                info!(topics = ?topics, version, "Resubscribed to refreshed topic set");
            },
            Err(e) => {
                // Keep the old subscription; try again on the next change.
                *subscribed_version = version;
                warn!(error = %e, "Resubscription failed, keeping previous subscription");
            },
        }
        debug!(version, "Registry change handled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HandlerError;
    use crate::test_utils::{RecordingHandler, ScriptedEventSource};

    fn message(offset: i64) -> Event {
        Event::Message(ConsumedMessage::new("orders", 0, offset))
    }

    fn build(
        source: ScriptedEventSource,
        handler: RecordingHandler,
        topics: &[&str],
    ) -> ConsumptionLoop<ScriptedEventSource, RecordingHandler> {
        let registry = Arc::new(TopicRegistry::with_topics(topics.iter().copied()));
        ConsumptionLoop::new(source, handler, registry, Duration::from_millis(1))
    }

    #[test]
    fn test_dispatches_messages_in_order_and_skips_other_events() {
        let shutdown = CancellationToken::new();
        let source = ScriptedEventSource::new(vec![
            message(5),
            Event::Empty,
            Event::PartitionEnd {
                topic: "orders".into(),
                partition: 0,
                offset: 6,
            },
            message(6),
        ])
        .cancel_when_drained(shutdown.clone());
        let handler = RecordingHandler::new();

        let summary = build(source.clone(), handler.clone(), &["orders"])
            .run(shutdown)
            .unwrap();

        assert_eq!(handler.offsets(), vec![5, 6]);
        assert_eq!(summary.messages, 2);
        assert_eq!(summary.partition_ends, 1);
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert_eq!(source.subscriptions(), vec![vec!["orders".to_string()]]);
        assert!(source.is_closed());
    }

    #[test]
    fn test_handler_errors_do_not_stop_the_loop() {
        let shutdown = CancellationToken::new();
        let source = ScriptedEventSource::new(vec![message(1), message(2), message(3)])
            .cancel_when_drained(shutdown.clone());
        let handler = RecordingHandler::new().failing_on([2]);

        let summary = build(source, handler.clone(), &["orders"]).run(shutdown).unwrap();

        assert_eq!(handler.offsets(), vec![1, 2, 3]);
        assert_eq!(summary.messages, 3);
        assert_eq!(summary.handler_errors, 1);
    }

    #[test]
    fn test_non_fatal_transport_error_keeps_polling() {
        let shutdown = CancellationToken::new();
        let source = ScriptedEventSource::new(vec![
            message(1),
            Event::TransportError {
                code: "BrokerTransportFailure".into(),
                description: "connection reset".into(),
                fatal: false,
            },
            message(2),
        ])
        .cancel_when_drained(shutdown.clone());
        let handler = RecordingHandler::new();

        let summary = build(source, handler.clone(), &["orders"]).run(shutdown).unwrap();

        assert_eq!(handler.offsets(), vec![1, 2]);
        assert_eq!(summary.transport_errors, 1);
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
    }

    #[test]
    fn test_fatal_transport_error_stops_and_broadcasts() {
        let shutdown = CancellationToken::new();
        let source = ScriptedEventSource::new(vec![
            message(1),
            Event::TransportError {
                code: "Fatal".into(),
                description: "producer fenced".into(),
                fatal: true,
            },
            message(2),
        ]);
        let handler = RecordingHandler::new();

        let summary = build(source.clone(), handler.clone(), &["orders"])
            .run(shutdown.clone())
            .unwrap();

        assert_eq!(handler.offsets(), vec![1]);
        assert!(matches!(summary.stop_reason, StopReason::FatalTransportError { .. }));
        assert!(shutdown.is_cancelled());
        assert!(source.is_closed());
    }

    #[test]
    fn test_subscription_failure_is_fatal() {
        let source = ScriptedEventSource::new(vec![message(1)]);
        source.fail_subscribe("unknown group");
        let handler = RecordingHandler::new();

        let shutdown = CancellationToken::new();
        let result = build(source.clone(), handler.clone(), &["orders"]).run(shutdown.clone());

        assert!(matches!(result, Err(Error::Subscription(_))));
        assert!(shutdown.is_cancelled());
        assert!(handler.offsets().is_empty());
        assert_eq!(source.polls(), 0);
    }

    #[test]
    fn test_cancelled_before_start_polls_nothing() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let source = ScriptedEventSource::new(vec![message(1)]);

        let summary = build(source.clone(), RecordingHandler::new(), &["orders"])
            .run(shutdown)
            .unwrap();

        assert_eq!(summary.messages, 0);
        assert_eq!(source.polls(), 0);
        assert!(source.is_closed());
    }

    #[test]
    fn test_subscribes_once_by_default() {
        let shutdown = CancellationToken::new();
        let registry = Arc::new(TopicRegistry::with_topics(["orders"]));
        let source = ScriptedEventSource::new(vec![message(1), message(2)])
            .cancel_when_drained(shutdown.clone());

        let changer = {
            let registry = Arc::clone(&registry);
            move |_: &ConsumedMessage| -> std::result::Result<(), HandlerError> {
                registry.replace(["orders", "payments"]);
                Ok(())
            }
        };

        ConsumptionLoop::new(source.clone(), changer, registry, Duration::from_millis(1))
            .run(shutdown)
            .unwrap();

        assert_eq!(source.subscriptions().len(), 1);
    }

    #[test]
    fn test_resubscribes_when_registry_changes() {
        let shutdown = CancellationToken::new();
        let registry = Arc::new(TopicRegistry::with_topics(["orders"]));
        let source = ScriptedEventSource::new(vec![message(1), message(2)])
            .cancel_when_drained(shutdown.clone());

        let changer = {
            let registry = Arc::clone(&registry);
            move |_: &ConsumedMessage| -> std::result::Result<(), HandlerError> {
                registry.replace(["orders", "payments"]);
                Ok(())
            }
        };

        let summary = ConsumptionLoop::new(source.clone(), changer, registry, Duration::from_millis(1))
            .resubscribe_on_change(true)
            .run(shutdown)
            .unwrap();

        assert_eq!(
            source.subscriptions(),
            vec![
                vec!["orders".to_string()],
                vec!["orders".to_string(), "payments".to_string()],
            ]
        );
        assert_eq!(summary.resubscriptions, 1);
    }

    #[tokio::test]
    async fn test_spawned_loop_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let source = ScriptedEventSource::new(Vec::new());
        let handle = build(source.clone(), RecordingHandler::new(), &["orders"]).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert!(source.polls() > 0);
    }
}
