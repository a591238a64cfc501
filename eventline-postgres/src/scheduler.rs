//! The shared polling loop underneath the outbox and view workers (spec.md
//! §4.5): one task per subscription name, driving leader election, batch
//! fetch, handler dispatch, and backoff. Outbox and views differ only in
//! what query they fetch against and what a batch handler does with the
//! result, so this is written once and parameterized over both.
use std::sync::Arc;
use std::time::Duration;

use eventline::{BatchHandler, Cursor, LeaderElector, ProcessorConfig, ProcessorStatus, ProgressTracker};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fetches the next batch of events past `after` for one subscription.
/// Implemented per-processor (outbox: by topic/publisher query; views: by
/// a view's subscription config), so the scheduler loop never needs to
/// know about `Query`/`EventStore` directly.
#[async_trait::async_trait]
pub trait EventFetcher: Send + Sync {
    type Event: Send + Sync;

    async fn fetch(&self, after: Cursor, batch_size: usize) -> Result<Vec<Self::Event>, eventline::EventStoreError>;

    /// The cursor of the last event in a fetched batch, used to advance
    /// progress after a successful handle.
    fn cursor_of(&self, event: &Self::Event) -> Cursor;
}

/// Drives one named subscription to completion: leader election, fetch,
/// handle, progress, backoff -- reused identically by outbox and views.
pub struct Scheduler<F, H>
where
    F: EventFetcher,
    H: BatchHandler<Event = F::Event>,
{
    name: String,
    /// The advisory-lock key this scheduler contends for. Equal to `name`
    /// under `LockStrategy::PerSubscription`; a key shared by every
    /// scheduler in the family under `LockStrategy::Global` (spec.md §4.5).
    leader_key: String,
    config: ProcessorConfig,
    fetcher: Arc<F>,
    handler: Arc<H>,
    leader: Arc<dyn LeaderElector>,
    progress: Arc<dyn ProgressTracker>,
}

impl<F, H> Scheduler<F, H>
where
    F: EventFetcher + 'static,
    H: BatchHandler<Event = F::Event> + 'static,
{
    /// `family_lock_key` is the shared key used when `config.lock_strategy`
    /// is `Global` (e.g. `"outbox"` or `"views"`); under `PerSubscription`
    /// each scheduler locks on its own `name` instead.
    pub fn new(
        name: impl Into<String>,
        family_lock_key: &str,
        config: ProcessorConfig,
        fetcher: F,
        handler: H,
        leader: Arc<dyn LeaderElector>,
        progress: Arc<dyn ProgressTracker>,
    ) -> Self {
        let name = name.into();
        let leader_key = match config.lock_strategy {
            eventline::LockStrategy::Global => family_lock_key.to_string(),
            eventline::LockStrategy::PerSubscription => name.clone(),
        };
        Self {
            name,
            leader_key,
            config,
            fetcher: Arc::new(fetcher),
            handler: Arc::new(handler),
            leader,
            progress,
        }
    }

    /// Runs the poll loop until `shutdown` is cancelled. A cancellation
    /// observed during the sleep between batches returns immediately
    /// without touching progress; a cancellation observed mid-batch lets
    /// the in-flight handler call finish naturally (spec.md §4.5
    /// "Cancellation").
    pub async fn run(self, shutdown: CancellationToken) {
        let leader_retry = self.config.leader_retry_interval;
        let mut backoff_errors: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                return;
            }

            match self.leader.try_acquire(&self.leader_key).await {
                Ok(true) => {
                    if let Err(err) = self.progress.touch_leader(&self.name, self.leader.instance_id()).await {
                        warn!(processor = %self.name, %err, "failed to record leader heartbeat");
                    }
                }
                Ok(false) => {
                    debug!(processor = %self.name, leader_key = %self.leader_key, "not leader, waiting");
                    if sleep_or_cancelled(leader_retry, &shutdown).await {
                        return;
                    }
                    continue;
                }
                Err(err) => {
                    warn!(processor = %self.name, %err, "leader election failed, retrying");
                    if sleep_or_cancelled(leader_retry, &shutdown).await {
                        return;
                    }
                    continue;
                }
            }

            let progress = match self.progress.load(&self.name).await {
                Ok(progress) => progress,
                Err(err) => {
                    // Tables may not exist yet if migrations are still running
                    // concurrently with startup (spec.md §4.5 "Startup ordering
                    // hazard") -- skip this cycle and retry.
                    warn!(processor = %self.name, %err, "progress unavailable, retrying next tick");
                    if sleep_or_cancelled(self.config.poll_interval, &shutdown).await {
                        return;
                    }
                    continue;
                }
            };

            if progress.status == ProcessorStatus::Paused {
                if sleep_or_cancelled(self.config.poll_interval, &shutdown).await {
                    return;
                }
                continue;
            }

            let batch = match self.fetcher.fetch(progress.cursor, self.config.batch_size).await {
                Ok(batch) => batch,
                Err(err) => {
                    self.record_failure(&err.to_string(), &mut backoff_errors, &shutdown).await;
                    continue;
                }
            };

            if batch.is_empty() {
                if sleep_or_cancelled(self.config.poll_interval, &shutdown).await {
                    return;
                }
                continue;
            }

            let last_cursor = self
                .fetcher
                .cursor_of(batch.last().expect("checked non-empty above"));

            match self.handler.handle_batch(&batch).await {
                Ok(()) => {
                    backoff_errors = 0;
                    if let Err(err) = self.progress.advance(&self.name, last_cursor).await {
                        error!(processor = %self.name, %err, "failed to advance progress after a handled batch");
                    } else {
                        info!(processor = %self.name, batch_size = batch.len(), "batch handled");
                    }
                }
                Err(err) => {
                    self.record_failure(&err.to_string(), &mut backoff_errors, &shutdown).await;
                }
            }
        }
    }

    async fn record_failure(&self, message: &str, backoff_errors: &mut u32, shutdown: &CancellationToken) {
        *backoff_errors += 1;
        let progress = self.progress.record_error(&self.name, message).await.ok();
        let consecutive_errors = progress.map(|p| p.consecutive_errors).unwrap_or(*backoff_errors);

        if consecutive_errors >= self.config.max_consecutive_errors {
            warn!(processor = %self.name, consecutive_errors, "pausing after too many consecutive errors");
            let _ = self.progress.pause(&self.name).await;
            return;
        }

        let backoff = self.config.base_backoff
            * self
                .config
                .backoff_multiplier
                .saturating_pow(consecutive_errors.saturating_sub(1));
        let backoff = backoff.min(self.config.max_backoff);
        error!(processor = %self.name, %message, ?backoff, "batch failed, backing off");
        sleep_or_cancelled(backoff, shutdown).await;
    }
}

/// Sleeps for `duration` unless `shutdown` fires first. Returns `true` if
/// the sleep was interrupted by shutdown.
async fn sleep_or_cancelled(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.cancelled() => true,
    }
}
