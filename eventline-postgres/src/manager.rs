//! Operator-facing management surface shared by the outbox and view
//! workers (spec.md §4.6, §4.7): pause/resume/reset plus status and detail
//! queries. Built once over [`eventline::ProgressTracker`] and reused by
//! both `OutboxManager` and `ViewManager`, which differ only in which
//! progress table they point at.
use eventline::{EventStoreError, Progress, ProgressTracker};
use sqlx::PgPool;

use crate::Error;

/// A processor's run status plus how far behind the log it is.
#[derive(Debug, Clone)]
pub struct ProcessorStatusReport {
    pub status: eventline::ProcessorStatus,
    pub lag: i64,
}

/// Wraps a [`ProgressTracker`] with the read-only `events` table query
/// needed to compute lag, and exposes the pause/resume/reset/status/detail
/// operations an operator or admin endpoint drives.
pub struct ProcessorManager<PT: ProgressTracker> {
    pool: PgPool,
    tracker: PT,
}

impl<PT: ProgressTracker> ProcessorManager<PT> {
    pub fn new(pool: PgPool, tracker: PT) -> Self {
        Self { pool, tracker }
    }

    pub async fn pause(&self, name: &str) -> Result<(), EventStoreError> {
        self.tracker.pause(name).await
    }

    pub async fn resume(&self, name: &str) -> Result<(), EventStoreError> {
        self.tracker.resume(name).await
    }

    /// Resets the named processor back to the start of the log.
    pub async fn reset(&self, name: &str) -> Result<(), EventStoreError> {
        self.tracker.reset(name).await
    }

    pub async fn get_details(&self, name: &str) -> Result<Progress, EventStoreError> {
        self.tracker.load(name).await
    }

    pub async fn get_status(&self, name: &str) -> Result<ProcessorStatusReport, EventStoreError> {
        let progress = self.tracker.load(name).await?;
        let max_position: Option<i64> = sqlx::query_scalar("SELECT max(position) FROM events")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        let lag = max_position.unwrap_or(0) - progress.cursor.position;
        Ok(ProcessorStatusReport { status: progress.status, lag: lag.max(0) })
    }
}
