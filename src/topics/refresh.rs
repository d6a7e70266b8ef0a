//! Periodic topic refresh

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TopicRegistry;
use crate::admin::AdminGate;
use crate::broker::BrokerAdmin;
use crate::error::Result;
use crate::logging::Timer;

/// Background activity that repopulates a [`TopicRegistry`] from broker metadata
///
/// Refreshes once immediately, then once per interval. A failed refresh
/// keeps the previous snapshot; the next tick is the retry.
pub struct RefreshRoutine<A> {
    gate: AdminGate<A>,
    registry: Arc<TopicRegistry>,
    interval: Duration,
    include_internal: bool,
}

impl<A: BrokerAdmin + 'static> RefreshRoutine<A> {
    /// Create a refresh routine for non-internal topics
    pub fn new(gate: AdminGate<A>, registry: Arc<TopicRegistry>, interval: Duration) -> Self {
        Self {
            gate,
            registry,
            interval,
            include_internal: false,
        }
    }

    /// Keep internal topics in the registry as well
    pub fn include_internal(mut self, include: bool) -> Self {
        self.include_internal = include;
        self
    }

    /// Perform one refresh
    ///
    /// Returns the number of topics now in the registry.
    pub async fn refresh_once(&self) -> Result<usize> {
        let timer = Timer::start("topic_refresh");
        let topics = match self.gate.list_topics(self.include_internal).await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    kept = self.registry.len(),
                    "Topic refresh failed, keeping previous topic set"
                );
                return Err(e);
            },
        };
        timer.stop();

        let count = topics.len();
        if self.registry.replace(topics) {
            info!(
                topics = ?self.registry.snapshot(),
                version = self.registry.version(),
                "Topic set changed"
            );
        } else {
            debug!(count, "Topic set unchanged");
        }

        Ok(count)
    }

    /// Refresh on every tick until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.interval.as_millis() as u64, "Topic refresh started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    // Errors are logged inside; the next tick retries.
                    let _ = self.refresh_once().await;
                },
            }
        }

        info!("Topic refresh stopped");
    }

    /// Run on the tokio runtime
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
