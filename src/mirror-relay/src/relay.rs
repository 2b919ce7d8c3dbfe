//! Event runtime.
//!
//! [`Relay::run`] consumes a stream of [`SourceEvent`]s and dispatches each
//! one on its own task. Shutdown (cancellation or end of stream) stops
//! intake, waits up to the grace period for in-flight events, then persists
//! the correlation store.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::time::{Instant, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::RelayResult;
use crate::events::SourceEvent;
use crate::handlers::{MirrorContext, Pipelines};
use crate::store::CorrelationStore;

/// Runtime knobs.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Correlation file loaded at start and saved at shutdown. `None` keeps
    /// the store in memory only.
    pub tracked_path: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            tracked_path: None,
            sweep_interval: Duration::from_secs(3600),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Outcome counts of a [`Relay::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub received: usize,
    pub dispatched: usize,
    pub failed: usize,
    /// Events still in flight when the grace period ran out.
    pub abandoned: usize,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicUsize,
    failed: AtomicUsize,
}

pub struct Relay {
    pipelines: Arc<Pipelines>,
    store: Arc<CorrelationStore>,
    options: RelayOptions,
}

impl Relay {
    pub fn new(ctx: Arc<MirrorContext>, options: RelayOptions) -> Self {
        let store = ctx.store.clone();
        Self {
            pipelines: Arc::new(Pipelines::new(ctx)),
            store,
            options,
        }
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    /// Mirror `events` until the stream ends or `shutdown` is cancelled.
    pub async fn run<S>(&self, events: S, shutdown: CancellationToken) -> RelayResult<RunSummary>
    where
        S: Stream<Item = SourceEvent> + Send + Unpin,
    {
        if let Some(path) = &self.options.tracked_path {
            self.store.load(path).await?;
        }

        let sweeper_token = shutdown.child_token();
        let sweeper = tokio::spawn(sweep_periodically(
            self.store.clone(),
            self.options.sweep_interval,
            sweeper_token.clone(),
        ));

        let tracker = TaskTracker::new();
        let counters = Arc::new(Counters::default());
        let mut received = 0;
        let mut events = events;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no longer accepting events");
                    break;
                }

                next = events.next() => {
                    let Some(event) = next else {
                        debug!("Event stream ended");
                        break;
                    };
                    received += 1;
                    let pipelines = self.pipelines.clone();
                    let counters = counters.clone();
                    tracker.spawn(async move {
                        match pipelines.dispatch(&event).await {
                            Ok(()) => {
                                counters.dispatched.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                counters.failed.fetch_add(1, Ordering::Relaxed);
                                warn!(
                                    event = event.kind(),
                                    message_id = %event.message_id(),
                                    error = %e,
                                    "Event dropped"
                                );
                            }
                        }
                    });
                }
            }
        }

        tracker.close();
        let abandoned = match timeout(self.options.shutdown_grace, tracker.wait()).await {
            Ok(()) => 0,
            Err(_) => {
                let pending = tracker.len();
                warn!(
                    pending,
                    grace_ms = self.options.shutdown_grace.as_millis() as u64,
                    "Grace period elapsed, abandoning in-flight events"
                );
                pending
            }
        };

        sweeper_token.cancel();
        let _ = sweeper.await;

        self.store.sweep_expired();
        if let Some(path) = &self.options.tracked_path {
            self.store.save(path).await?;
        }

        let summary = RunSummary {
            received,
            dispatched: counters.dispatched.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            abandoned,
        };
        info!(
            received = summary.received,
            dispatched = summary.dispatched,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "Relay stopped"
        );
        Ok(summary)
    }
}

async fn sweep_periodically(
    store: Arc<CorrelationStore>,
    period: Duration,
    cancel: CancellationToken,
) {
    let period = period.max(Duration::from_secs(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let removed = store.sweep_expired();
                debug!(removed, "Periodic sweep");
            }
        }
    }
}
