//! Topic administration gate
//!
//! Turns broker metadata into topic lists and guards topic deletion behind
//! an existence check and an explicit operator confirmation. Deletion is
//! one-shot: nothing here retries a delete.

mod confirm;

pub use confirm::{is_confirmed, Confirmer, StdinConfirmer, CONFIRMATION_TOKEN};

use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::broker::BrokerAdmin;
use crate::error::{Error, Result};
use crate::logging::Timer;
use crate::models::is_internal_topic;

/// Outcome of a batch deletion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    /// Topics deleted, in request order
    pub deleted: Vec<String>,

    /// Topics that failed, with the error message
    pub failed: Vec<(String, String)>,

    /// Topics never processed because the batch was aborted
    pub skipped: Vec<String>,

    /// Topic whose confirmation was refused, if any
    pub aborted_at: Option<String>,
}

impl DeletionReport {
    /// Whether the operator stopped the batch
    pub fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }

    /// Whether every requested topic was deleted
    pub fn is_complete(&self) -> bool {
        !self.is_aborted() && self.failed.is_empty()
    }
}

/// Any failure of a metadata query is reported as `Error::Metadata`
fn as_metadata_error(error: Error) -> Error {
    match error {
        Error::Metadata(_) => error,
        other => Error::metadata(other.to_string()),
    }
}

/// Query and delete gate in front of a [`BrokerAdmin`]
pub struct AdminGate<A> {
    broker: A,
    metadata_timeout: Duration,
    delete_timeout: Duration,
}

impl<A: BrokerAdmin> AdminGate<A> {
    /// Create a gate with the given request timeouts
    pub fn new(broker: A, metadata_timeout: Duration, delete_timeout: Duration) -> Self {
        Self {
            broker,
            metadata_timeout,
            delete_timeout,
        }
    }

    /// Access the underlying broker client
    pub fn broker(&self) -> &A {
        &self.broker
    }

    /// List topic names known to the broker
    ///
    /// Internal topics are dropped unless `include_internal` is set. The
    /// order follows the broker's metadata and is not stable.
    pub async fn list_topics(&self, include_internal: bool) -> Result<Vec<String>> {
        let metadata = self
            .broker
            .fetch_metadata(None, self.metadata_timeout)
            .await
            .map_err(as_metadata_error)?;

        let mut seen = HashSet::with_capacity(metadata.len());
        let topics: Vec<String> = metadata
            .into_iter()
            .map(|topic| topic.name)
            .filter(|name| include_internal || !is_internal_topic(name))
            .filter(|name| seen.insert(name.clone()))
            .collect();

        debug!(count = topics.len(), include_internal, "Listed topics");
        Ok(topics)
    }

    /// Check whether `topic` exists on the broker
    ///
    /// An empty metadata answer, or one carrying a per-topic error, means the
    /// topic does not exist.
    pub async fn topic_exists(&self, topic: &str) -> Result<bool> {
        let metadata = self
            .broker
            .fetch_metadata(Some(topic), self.metadata_timeout)
            .await
            .map_err(as_metadata_error)?;

        Ok(metadata
            .iter()
            .any(|t| t.name == topic && t.error.is_none()))
    }

    /// Delete one topic after an existence check and operator confirmation
    ///
    /// Fails with `NotFound` without contacting the delete API when the topic
    /// is missing, with `Aborted` when the answer is not exactly `yes`, with
    /// `DeleteTimeout` or `Broker` when the broker does not delete it.
    pub async fn delete_topic(&self, topic: &str, confirmer: &mut dyn Confirmer) -> Result<()> {
        if !self.topic_exists(topic).await? {
            return Err(Error::NotFound(topic.to_string()));
        }

        let answer = confirmer.answer(topic).await?;
        if !is_confirmed(&answer) {
            return Err(Error::Aborted(format!(
                "deletion of topic '{}' was not confirmed",
                topic
            )));
        }

        info!(topic, "Deleting topic");
        let timer = Timer::start(format!("delete_topic {}", topic));
        let results = self
            .broker
            .delete_topics(&[topic.to_string()], self.delete_timeout)
            .await?;
        timer.stop();

        let result = results
            .into_iter()
            .find(|deletion| deletion.topic == topic)
            .ok_or_else(|| Error::broker(topic, "no result returned for topic"))?;

        result.result.map_err(|reason| Error::broker(topic, reason))
    }

    /// Delete several topics, one confirmation each
    ///
    /// A failure on one topic is recorded and the batch moves on; a refused
    /// confirmation stops the whole batch.
    pub async fn delete_topics(
        &self,
        topics: &[String],
        confirmer: &mut dyn Confirmer,
    ) -> DeletionReport {
        let mut report = DeletionReport::default();

        for (index, topic) in topics.iter().enumerate() {
            match self.delete_topic(topic, confirmer).await {
                Ok(()) => {
                    info!(topic = %topic, "Topic permanently deleted");
                    report.deleted.push(topic.clone());
                },
                Err(Error::Aborted(reason)) => {
                    warn!(topic = %topic, reason = %reason, "Deletion aborted by operator");
                    report.aborted_at = Some(topic.clone());
                    report.skipped = topics[index + 1..].to_vec();
                    break;
                },
                Err(e) => {
                    crate::log_error!(e, "Failed to delete topic", topic = topic);
                    report.failed.push((topic.clone(), e.to_string()));
                },
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{TopicDeletion, TopicMetadata};
    use crate::test_utils::{MockBrokerAdmin, ScriptedConfirmer};

    fn gate(broker: MockBrokerAdmin) -> AdminGate<MockBrokerAdmin> {
        AdminGate::new(broker, Duration::from_secs(5), Duration::from_secs(5))
    }

    fn sorted(mut topics: Vec<String>) -> Vec<String> {
        topics.sort();
        topics
    }

    #[tokio::test]
    async fn test_list_topics_filters_internal() {
        let broker = MockBrokerAdmin::with_topics(["orders", "_schemas", "payments"]);
        let gate = gate(broker);

        let visible = gate.list_topics(false).await.unwrap();
        assert_eq!(sorted(visible), vec!["orders", "payments"]);

        let all = gate.list_topics(true).await.unwrap();
        assert_eq!(sorted(all), vec!["_schemas", "orders", "payments"]);
    }

    #[tokio::test]
    async fn test_list_topics_counts_hold_for_any_order() {
        let names = ["a", "__consumer_offsets", "b", "_schemas", "c", "_confluent"];
        for rotation in 0..names.len() {
            let mut ordered = names.to_vec();
            ordered.rotate_left(rotation);
            let gate = gate(MockBrokerAdmin::with_topics(ordered));

            let visible = gate.list_topics(false).await.unwrap();
            let all = gate.list_topics(true).await.unwrap();
            assert_eq!(visible.len(), 3);
            assert_eq!(all.len(), 6);
            assert!(visible.iter().all(|t| !t.starts_with('_')));
        }
    }

    #[tokio::test]
    async fn test_list_topics_removes_duplicates() {
        let broker = MockBrokerAdmin::new();
        broker.set_metadata(vec![
            TopicMetadata::new("orders", 1),
            TopicMetadata::new("orders", 1),
            TopicMetadata::new("payments", 2),
        ]);

        let topics = gate(broker).list_topics(true).await.unwrap();
        assert_eq!(sorted(topics), vec!["orders", "payments"]);
    }

    #[tokio::test]
    async fn test_list_topics_propagates_metadata_error() {
        let broker = MockBrokerAdmin::with_topics(["orders"]);
        broker.fail_next_metadata("broker unreachable");

        let result = gate(broker).list_topics(false).await;
        assert!(matches!(result, Err(Error::Metadata(_))));
    }

    #[tokio::test]
    async fn test_topic_exists() {
        let gate = gate(MockBrokerAdmin::with_topics(["orders"]));
        assert!(gate.topic_exists("orders").await.unwrap());
        assert!(!gate.topic_exists("missing-topic").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_topic_never_calls_delete() {
        let broker = MockBrokerAdmin::with_topics(["orders"]);
        let gate = gate(broker.clone());
        let mut confirmer = ScriptedConfirmer::new(["yes"]);

        let result = gate.delete_topic("missing-topic", &mut confirmer).await;

        assert!(matches!(result, Err(Error::NotFound(ref t)) if t == "missing-topic"));
        assert!(broker.delete_calls().is_empty());
        assert_eq!(confirmer.asked(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_topic_exists_normalises_errors_to_metadata() {
        let broker = MockBrokerAdmin::with_topics(["orders"]);
        broker.fail_next_metadata_with(Error::internal("Task failed: cancelled"));

        let result = gate(broker).topic_exists("orders").await;
        assert!(matches!(result, Err(Error::Metadata(ref msg)) if msg.contains("Task failed")));
    }

    #[tokio::test]
    async fn test_topic_exists_on_empty_metadata_answer() {
        let broker = MockBrokerAdmin::with_topics(["orders"]);
        broker.omit_unknown_topics();
        let gate = gate(broker.clone());

        assert!(gate.topic_exists("orders").await.unwrap());
        assert!(!gate.topic_exists("missing-topic").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_topic_missing_from_empty_metadata_answer() {
        let broker = MockBrokerAdmin::new();
        broker.set_metadata(vec![]);
        broker.omit_unknown_topics();
        let gate = gate(broker.clone());
        let mut confirmer = ScriptedConfirmer::new(["yes"]);

        let result = gate.delete_topic("missing-topic", &mut confirmer).await;

        assert!(matches!(result, Err(Error::NotFound(ref t)) if t == "missing-topic"));
        assert!(broker.delete_calls().is_empty());
        assert!(confirmer.asked().is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_exact_yes() {
        let broker = MockBrokerAdmin::with_topics(["orders"]);
        let gate = gate(broker.clone());
        let mut confirmer = ScriptedConfirmer::new(["Yes"]);

        let result = gate.delete_topic("orders", &mut confirmer).await;

        assert!(matches!(result, Err(Error::Aborted(_))));
        assert!(broker.delete_calls().is_empty());
        assert!(broker.has_topic("orders"));
    }

    #[tokio::test]
    async fn test_delete_confirmed_topic() {
        let broker = MockBrokerAdmin::with_topics(["orders", "payments"]);
        let gate = gate(broker.clone());
        let mut confirmer = ScriptedConfirmer::new(["yes\n"]);

        gate.delete_topic("orders", &mut confirmer).await.unwrap();

        assert_eq!(broker.delete_calls(), vec![vec!["orders".to_string()]]);
        assert!(!broker.has_topic("orders"));
        assert!(broker.has_topic("payments"));
    }

    #[tokio::test]
    async fn test_delete_surfaces_broker_rejection() {
        let broker = MockBrokerAdmin::with_topics(["orders"]);
        broker.set_delete_result(TopicDeletion::rejected("orders", "TopicAuthorizationFailed"));
        let gate = gate(broker);
        let mut confirmer = ScriptedConfirmer::new(["yes"]);

        let result = gate.delete_topic("orders", &mut confirmer).await;
        match result {
            Err(Error::Broker { topic, reason }) => {
                assert_eq!(topic, "orders");
                assert_eq!(reason, "TopicAuthorizationFailed");
            },
            other => panic!("expected broker error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_surfaces_timeout() {
        let broker = MockBrokerAdmin::with_topics(["orders"]);
        broker.time_out_next_delete();
        let gate = gate(broker);
        let mut confirmer = ScriptedConfirmer::new(["yes"]);

        let result = gate.delete_topic("orders", &mut confirmer).await;
        assert!(matches!(result, Err(Error::DeleteTimeout(_))));
    }

    #[tokio::test]
    async fn test_batch_abort_skips_remaining_topics() {
        let broker = MockBrokerAdmin::with_topics(["a", "b", "c"]);
        let gate = gate(broker.clone());
        let mut confirmer = ScriptedConfirmer::new(["yes", "no", "yes"]);
        let topics: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let report = gate.delete_topics(&topics, &mut confirmer).await;

        assert_eq!(report.deleted, vec!["a"]);
        assert_eq!(report.aborted_at.as_deref(), Some("b"));
        assert_eq!(report.skipped, vec!["c"]);
        assert!(!report.is_complete());
        assert_eq!(confirmer.asked(), vec!["a", "b"]);
        assert!(broker.has_topic("b"));
        assert!(broker.has_topic("c"));
    }

    #[tokio::test]
    async fn test_batch_continues_after_missing_topic() {
        let broker = MockBrokerAdmin::with_topics(["a", "c"]);
        let gate = gate(broker.clone());
        let mut confirmer = ScriptedConfirmer::new(["yes", "yes"]);
        let topics: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let report = gate.delete_topics(&topics, &mut confirmer).await;

        assert_eq!(report.deleted, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "b");
        assert!(!report.is_aborted());
        assert_eq!(broker.delete_calls().len(), 2);
    }
}
