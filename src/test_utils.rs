//! Test utilities for streamwarden
//!
//! In-memory doubles for the broker seams, plus a recording message handler
//! and a scripted operator. All doubles are cheap to clone; clones share
//! state so a test can keep a handle after moving one into the code under
//! test.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::admin::Confirmer;
use crate::broker::{BrokerAdmin, EventSource, MessageSink, TopicDeletion, TopicMetadata};
use crate::consumer::MessageHandler;
use crate::error::{Error, Result};
use crate::models::{
    ConsumedMessage, DeliveryFailure, DeliveryOutcome, DeliveryReport, Event, HandlerError,
    OutgoingMessage,
};

#[derive(Debug, Default)]
struct AdminState {
    topics: Vec<String>,
    metadata: Option<Vec<TopicMetadata>>,
    script: VecDeque<std::result::Result<Vec<String>, String>>,
    fail_next_metadata: Option<Error>,
    omit_unknown_topics: bool,
    metadata_calls: usize,
    delete_calls: Vec<Vec<String>>,
    delete_result: Option<TopicDeletion>,
    time_out_next_delete: bool,
}

/// Mock implementation of [`BrokerAdmin`] backed by a topic list
#[derive(Debug, Clone, Default)]
pub struct MockBrokerAdmin {
    state: Arc<Mutex<AdminState>>,
}

impl MockBrokerAdmin {
    /// Create a broker with no topics
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a broker with the given topics, reported in this order
    pub fn with_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let broker = Self::new();
        broker.set_topics(topics);
        broker
    }

    /// Replace the topic list
    pub fn set_topics<I, S>(&self, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().unwrap().topics = topics.into_iter().map(Into::into).collect();
    }

    /// Answer metadata queries with these exact descriptors
    pub fn set_metadata(&self, metadata: Vec<TopicMetadata>) {
        self.state.lock().unwrap().metadata = Some(metadata);
    }

    /// Script the next metadata answers; `Ok` also becomes the topic list
    pub fn script_metadata(&self, script: Vec<std::result::Result<Vec<&str>, &str>>) {
        let mut state = self.state.lock().unwrap();
        state.script = script
            .into_iter()
            .map(|step| {
                step.map(|topics| topics.into_iter().map(String::from).collect())
                    .map_err(String::from)
            })
            .collect();
    }

    /// Configure the next metadata query to fail
    pub fn fail_next_metadata(&self, error_message: &str) {
        self.fail_next_metadata_with(Error::metadata(error_message));
    }

    /// Configure the next metadata query to fail with `error`
    pub fn fail_next_metadata_with(&self, error: Error) {
        self.state.lock().unwrap().fail_next_metadata = Some(error);
    }

    /// Answer queries for unknown topics with no descriptors at all,
    /// instead of a descriptor carrying `UnknownTopicOrPartition`
    pub fn omit_unknown_topics(&self) {
        self.state.lock().unwrap().omit_unknown_topics = true;
    }

    /// Override the per-topic result of the next delete
    pub fn set_delete_result(&self, result: TopicDeletion) {
        self.state.lock().unwrap().delete_result = Some(result);
    }

    /// Configure the next delete request to time out
    pub fn time_out_next_delete(&self) {
        self.state.lock().unwrap().time_out_next_delete = true;
    }

    /// Number of metadata queries received
    pub fn metadata_calls(&self) -> usize {
        self.state.lock().unwrap().metadata_calls
    }

    /// Topics passed to each delete request
    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    /// Whether the broker still holds `topic`
    pub fn has_topic(&self, topic: &str) -> bool {
        self.state.lock().unwrap().topics.iter().any(|t| t == topic)
    }
}

#[async_trait]
impl BrokerAdmin for MockBrokerAdmin {
    async fn fetch_metadata(
        &self,
        topic: Option<&str>,
        _timeout: Duration,
    ) -> Result<Vec<TopicMetadata>> {
        let mut state = self.state.lock().unwrap();
        state.metadata_calls += 1;

        if let Some(error) = state.fail_next_metadata.take() {
            return Err(error);
        }

        if let Some(step) = state.script.pop_front() {
            match step {
                Ok(topics) => state.topics = topics,
                Err(msg) => return Err(Error::metadata(msg)),
            }
        }

        let all = match &state.metadata {
            Some(metadata) => metadata.clone(),
            None => state
                .topics
                .iter()
                .map(|name| TopicMetadata::new(name.clone(), 1))
                .collect(),
        };

        match topic {
            None => Ok(all),
            Some(wanted) => {
                let found: Vec<_> = all.into_iter().filter(|t| t.name == wanted).collect();
                if found.is_empty() && !state.omit_unknown_topics {
                    Ok(vec![TopicMetadata::with_error(wanted, "UnknownTopicOrPartition")])
                } else {
                    Ok(found)
                }
            },
        }
    }

    async fn delete_topics(
        &self,
        topics: &[String],
        _timeout: Duration,
    ) -> Result<Vec<TopicDeletion>> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(topics.to_vec());

        if std::mem::take(&mut state.time_out_next_delete) {
            return Err(Error::DeleteTimeout(topics.join(", ")));
        }

        let mut results = Vec::with_capacity(topics.len());
        for topic in topics {
            if let Some(result) = state.delete_result.take() {
                if &result.topic == topic {
                    results.push(result);
                    continue;
                }
                state.delete_result = Some(result);
            }

            let before = state.topics.len();
            state.topics.retain(|t| t != topic);
            if state.topics.len() < before {
                results.push(TopicDeletion::deleted(topic.clone()));
            } else {
                results.push(TopicDeletion::rejected(topic.clone(), "UnknownTopicOrPartition"));
            }
        }

        Ok(results)
    }
}

#[derive(Debug, Default)]
struct SourceState {
    events: VecDeque<Event>,
    subscriptions: Vec<Vec<String>>,
    fail_subscribe: Option<String>,
    polls: usize,
    closed: bool,
    cancel_when_drained: Option<CancellationToken>,
}

/// [`EventSource`] that replays a fixed list of events
///
/// Once the script is drained every poll sleeps for its budget and returns
/// `Event::Empty`, like an idle broker.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEventSource {
    state: Arc<Mutex<SourceState>>,
}

impl ScriptedEventSource {
    /// Create a source that will return `events` in order
    pub fn new(events: Vec<Event>) -> Self {
        let source = Self::default();
        source.state.lock().unwrap().events = events.into();
        source
    }

    /// Cancel `token` on the first poll after the script is drained
    pub fn cancel_when_drained(self, token: CancellationToken) -> Self {
        self.state.lock().unwrap().cancel_when_drained = Some(token);
        self
    }

    /// Append an event to the script
    pub fn push(&self, event: Event) {
        self.state.lock().unwrap().events.push_back(event);
    }

    /// Configure the next subscribe call to fail
    pub fn fail_subscribe(&self, error_message: &str) {
        self.state.lock().unwrap().fail_subscribe = Some(error_message.to_string());
    }

    /// Topic lists of every successful subscribe call
    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    /// Number of poll calls made
    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    /// Whether close was called
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl EventSource for ScriptedEventSource {
    fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = state.fail_subscribe.take() {
            return Err(Error::subscription(msg));
        }
        state.subscriptions.push(topics.to_vec());
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Event {
        let next = {
            let mut state = self.state.lock().unwrap();
            state.polls += 1;
            if state.closed {
                return Event::Empty;
            }
            let next = state.events.pop_front();
            if next.is_none() {
                if let Some(token) = &state.cancel_when_drained {
                    token.cancel();
                }
            }
            next
        };

        match next {
            Some(event) => event,
            None => {
                std::thread::sleep(timeout);
                Event::Empty
            },
        }
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closed = true;
    }
}

/// How [`MockMessageSink`] resolves delivery channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Acknowledge immediately on partition 0 with increasing offsets
    AutoAck,
    /// Hold every channel until the test resolves it
    Manual,
    /// Drop the sender without ever reporting
    DropSender,
}

#[derive(Debug)]
struct SinkState {
    mode: SinkMode,
    submitted: Vec<OutgoingMessage>,
    pending: Vec<Option<oneshot::Sender<DeliveryOutcome>>>,
    fail_next_submit: Option<String>,
    fail_next_delivery: Option<String>,
    next_offset: i64,
    flushes: usize,
}

/// Mock implementation of [`MessageSink`]
#[derive(Debug, Clone)]
pub struct MockMessageSink {
    state: Arc<Mutex<SinkState>>,
}

impl Default for MockMessageSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessageSink {
    /// Create a sink that acknowledges everything
    pub fn new() -> Self {
        Self::with_mode(SinkMode::AutoAck)
    }

    /// Create a sink whose channels are resolved by the test
    pub fn manual() -> Self {
        Self::with_mode(SinkMode::Manual)
    }

    /// Create a sink that never reports
    pub fn dropping() -> Self {
        Self::with_mode(SinkMode::DropSender)
    }

    fn with_mode(mode: SinkMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                mode,
                submitted: Vec::new(),
                pending: Vec::new(),
                fail_next_submit: None,
                fail_next_delivery: None,
                next_offset: 0,
                flushes: 0,
            })),
        }
    }

    /// Configure the next submit to fail immediately
    pub fn fail_next_submit(&self, error_message: &str) {
        self.state.lock().unwrap().fail_next_submit = Some(error_message.to_string());
    }

    /// Configure the next auto-acknowledged delivery to fail
    pub fn fail_next_delivery(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_delivery = Some(reason.to_string());
    }

    /// Messages accepted so far, in submission order
    pub fn submitted(&self) -> Vec<OutgoingMessage> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Number of manual channels not yet resolved
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .pending
            .iter()
            .filter(|sender| sender.is_some())
            .count()
    }

    /// Number of flush calls
    pub fn flushes(&self) -> usize {
        self.state.lock().unwrap().flushes
    }

    /// Acknowledge the `index`-th submitted message
    ///
    /// Returns false when that channel was already resolved or its receiver
    /// is gone.
    pub fn ack(&self, index: usize, partition: i32, offset: i64) -> bool {
        let mut state = self.state.lock().unwrap();
        let topic = match state.submitted.get(index) {
            Some(message) => message.topic.clone(),
            None => return false,
        };
        match state.pending.get_mut(index).and_then(Option::take) {
            Some(sender) => sender
                .send(Ok(DeliveryReport {
                    topic,
                    partition,
                    offset,
                }))
                .is_ok(),
            None => false,
        }
    }

    /// Fail the `index`-th submitted message
    pub fn fail(&self, index: usize, reason: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let topic = match state.submitted.get(index) {
            Some(message) => message.topic.clone(),
            None => return false,
        };
        match state.pending.get_mut(index).and_then(Option::take) {
            Some(sender) => sender
                .send(Err(DeliveryFailure {
                    topic,
                    reason: reason.to_string(),
                }))
                .is_ok(),
            None => false,
        }
    }
}

impl MessageSink for MockMessageSink {
    fn submit(&self, message: OutgoingMessage) -> Result<oneshot::Receiver<DeliveryOutcome>> {
        let mut state = self.state.lock().unwrap();
        if let Some(msg) = state.fail_next_submit.take() {
            return Err(Error::ProduceSubmit(msg));
        }

        let (tx, rx) = oneshot::channel();
        let topic = message.topic.clone();
        state.submitted.push(message);

        match state.mode {
            SinkMode::AutoAck => {
                let outcome = match state.fail_next_delivery.take() {
                    Some(reason) => Err(DeliveryFailure { topic, reason }),
                    None => {
                        let offset = state.next_offset;
                        state.next_offset += 1;
                        Ok(DeliveryReport {
                            topic,
                            partition: 0,
                            offset,
                        })
                    },
                };
                let _ = tx.send(outcome);
                state.pending.push(None);
            },
            SinkMode::Manual => state.pending.push(Some(tx)),
            SinkMode::DropSender => {
                drop(tx);
                state.pending.push(None);
            },
        }

        Ok(rx)
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        self.state.lock().unwrap().flushes += 1;
        Ok(())
    }
}

/// [`MessageHandler`] that records every message it sees
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    messages: Arc<Mutex<Vec<ConsumedMessage>>>,
    fail_offsets: Arc<HashSet<i64>>,
}

impl RecordingHandler {
    /// Create a handler that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail (after recording) the messages at these offsets
    pub fn failing_on<I: IntoIterator<Item = i64>>(mut self, offsets: I) -> Self {
        self.fail_offsets = Arc::new(offsets.into_iter().collect());
        self
    }

    /// Recorded messages, in delivery order
    pub fn messages(&self) -> Vec<ConsumedMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Offsets of the recorded messages, in delivery order
    pub fn offsets(&self) -> Vec<i64> {
        self.messages.lock().unwrap().iter().map(|m| m.offset).collect()
    }
}

impl MessageHandler for RecordingHandler {
    fn handle(&self, message: &ConsumedMessage) -> std::result::Result<(), HandlerError> {
        self.messages.lock().unwrap().push(message.clone());
        if self.fail_offsets.contains(&message.offset) {
            return Err(HandlerError::new(format!("rejected offset {}", message.offset)));
        }
        Ok(())
    }
}

/// [`Confirmer`] that replays canned answers
///
/// Runs out to an empty answer, which is a refusal.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedConfirmer {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Topics the operator was asked about, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn answer(&mut self, topic: &str) -> Result<String> {
        self.asked.push(topic.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}
