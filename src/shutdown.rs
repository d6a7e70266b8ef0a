//! Graceful shutdown coordination
//!
//! One [`ShutdownCoordinator`] per process. OS signals (or an in-process
//! request) cancel a single [`CancellationToken`] that every activity holds a
//! clone of; the coordinator then joins the activities with a deadline.

use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;

/// Lifecycle of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Running,
            1 => ShutdownState::Draining,
            _ => ShutdownState::Stopped,
        }
    }
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownState::Running => write!(f, "running"),
            ShutdownState::Draining => write!(f, "draining"),
            ShutdownState::Stopped => write!(f, "stopped"),
        }
    }
}

/// How one activity ended during [`ShutdownCoordinator::join_with_timeout`]
#[derive(Debug)]
pub enum ActivityExit<T> {
    /// Returned normally
    Finished(T),
    /// Panicked or was cancelled
    Failed(String),
    /// Still running when the deadline passed
    TimedOut,
}

impl<T> ActivityExit<T> {
    pub fn is_finished(&self) -> bool {
        matches!(self, ActivityExit::Finished(_))
    }
}

/// Broadcasts one shutdown request to every activity
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    state: Arc<AtomicU8>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(ShutdownState::Running as u8)),
        }
    }

    /// A clone of the broadcast token, one per activity
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Move from Running to Draining and cancel the token
    ///
    /// Returns false when shutdown was already requested.
    pub fn request_shutdown(&self) -> bool {
        let first = self
            .state
            .compare_exchange(
                ShutdownState::Running as u8,
                ShutdownState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        // The token may also have been cancelled by an activity directly.
        self.token.cancel();
        first
    }

    /// Move from Draining to Stopped
    pub fn mark_stopped(&self) {
        let _ = self.state.compare_exchange(
            ShutdownState::Draining as u8,
            ShutdownState::Stopped as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.state() != ShutdownState::Running || self.token.is_cancelled()
    }

    /// Wait for CTRL+C, SIGTERM, or an in-process cancellation, then request
    /// shutdown
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                },
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                },
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received CTRL+C, starting graceful shutdown");
            },
            _ = terminate => {
                info!("Received SIGTERM, starting graceful shutdown");
            },
            _ = self.token.cancelled() => {
                info!("Shutdown requested in-process, starting graceful shutdown");
            },
        }

        self.request_shutdown();
    }

    /// Join every activity, giving all of them together at most `deadline`
    ///
    /// Activities still running at the deadline are reported as timed out
    /// and left to die with the runtime. Marks the coordinator stopped.
    pub async fn join_with_timeout<T>(
        &self,
        activities: Vec<(&'static str, JoinHandle<T>)>,
        deadline: Duration,
    ) -> Vec<(&'static str, ActivityExit<T>)> {
        let until = Instant::now() + deadline;

        let joins = activities.into_iter().map(|(name, handle)| async move {
            let exit = match tokio::time::timeout_at(until, handle).await {
                Ok(Ok(value)) => {
                    info!(activity = name, "Activity stopped");
                    ActivityExit::Finished(value)
                },
                Ok(Err(e)) => {
                    error!(activity = name, error = %e, "Activity failed");
                    ActivityExit::Failed(e.to_string())
                },
                Err(_) => {
                    warn!(
                        activity = name,
                        deadline_secs = deadline.as_secs(),
                        "Activity did not stop before the shutdown deadline"
                    );
                    ActivityExit::TimedOut
                },
            };
            (name, exit)
        });

        let exits = join_all(joins).await;
        self.request_shutdown();
        self.mark_stopped();
        exits
    }
}

/// Drive `future` on a fresh multi-threaded runtime, then tear it down
///
/// Tasks still running when `future` returns get at most `grace` to finish.
/// Blocking tasks stuck past that are detached, so the process can exit
/// while one is still inside a poll.
pub fn block_on_bounded<F: Future>(future: F, grace: Duration) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}
