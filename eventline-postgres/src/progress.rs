//! Durable processor progress, stored in one of the two fixed tables
//! (`outbox_progress`, `view_progress` -- spec.md §9, resolved in
//! DESIGN.md towards two tables rather than one shared one). Table name is
//! always one of these two compile-time constants, never caller input, so
//! building the query text with it carries no injection risk.
use async_trait::async_trait;
use eventline::{Cursor, EventStoreError, ProcessorStatus, Progress, ProgressTracker};
use sqlx::{PgPool, Row};

use crate::Error;

/// Tracks progress rows in `table`, auto-creating a row at `position = 0`
/// on first access for a processor name that has never been seen.
pub struct PgProgressTracker {
    pool: PgPool,
    table: &'static str,
}

impl PgProgressTracker {
    /// Tracks rows in the `outbox_progress` table.
    pub fn outbox(pool: PgPool) -> Self {
        Self { pool, table: "outbox_progress" }
    }

    /// Tracks rows in the `view_progress` table.
    pub fn views(pool: PgPool) -> Self {
        Self { pool, table: "view_progress" }
    }

    async fn ensure_row(&self, processor_name: &str) -> Result<(), Error> {
        sqlx::query(&format!(
            "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
            self.table
        ))
        .bind(processor_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn parse_status(raw: &str) -> ProcessorStatus {
    match raw {
        "paused" => ProcessorStatus::Paused,
        _ => ProcessorStatus::Running,
    }
}

#[async_trait]
impl ProgressTracker for PgProgressTracker {
    async fn load(&self, processor_name: &str) -> Result<Progress, EventStoreError> {
        self.ensure_row(processor_name).await?;

        let row = sqlx::query(&format!(
            "SELECT position, transaction_id, status, consecutive_errors, last_error, \
             leader_instance, leader_since, leader_heartbeat FROM {} WHERE name = $1",
            self.table
        ))
        .bind(processor_name)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Progress {
            name: processor_name.to_string(),
            cursor: Cursor::new(row.try_get("position").map_err(Error::Database)?, row.try_get("transaction_id").map_err(Error::Database)?),
            status: parse_status(row.try_get::<String, _>("status").map_err(Error::Database)?.as_str()),
            consecutive_errors: row.try_get::<i32, _>("consecutive_errors").map_err(Error::Database)? as u32,
            last_error: row.try_get("last_error").map_err(Error::Database)?,
            leader_instance: row.try_get("leader_instance").map_err(Error::Database)?,
            leader_since: row.try_get("leader_since").map_err(Error::Database)?,
            leader_heartbeat: row.try_get("leader_heartbeat").map_err(Error::Database)?,
        })
    }

    async fn touch_leader(&self, processor_name: &str, instance: &str) -> Result<(), EventStoreError> {
        self.ensure_row(processor_name).await?;
        sqlx::query(&format!(
            "UPDATE {} SET \
               leader_since = CASE WHEN leader_instance IS DISTINCT FROM $2 THEN now() ELSE leader_since END, \
               leader_instance = $2, \
               leader_heartbeat = now() \
             WHERE name = $1",
            self.table
        ))
        .bind(processor_name)
        .bind(instance)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn advance(&self, processor_name: &str, cursor: Cursor) -> Result<(), EventStoreError> {
        sqlx::query(&format!(
            "UPDATE {} SET position = $2, transaction_id = $3, consecutive_errors = 0, last_error = NULL, updated_at = now() WHERE name = $1",
            self.table
        ))
        .bind(processor_name)
        .bind(cursor.position)
        .bind(cursor.transaction_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn record_error(&self, processor_name: &str, error: &str) -> Result<Progress, EventStoreError> {
        sqlx::query(&format!(
            "UPDATE {} SET consecutive_errors = consecutive_errors + 1, last_error = $2, updated_at = now() WHERE name = $1",
            self.table
        ))
        .bind(processor_name)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        self.load(processor_name).await
    }

    async fn clear_errors(&self, processor_name: &str) -> Result<(), EventStoreError> {
        sqlx::query(&format!(
            "UPDATE {} SET consecutive_errors = 0, last_error = NULL WHERE name = $1",
            self.table
        ))
        .bind(processor_name)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn pause(&self, processor_name: &str) -> Result<(), EventStoreError> {
        self.ensure_row(processor_name).await?;
        sqlx::query(&format!("UPDATE {} SET status = 'paused', updated_at = now() WHERE name = $1", self.table))
            .bind(processor_name)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn resume(&self, processor_name: &str) -> Result<(), EventStoreError> {
        sqlx::query(&format!(
            "UPDATE {} SET status = 'running', consecutive_errors = 0, last_error = NULL, updated_at = now() WHERE name = $1",
            self.table
        ))
        .bind(processor_name)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn reset(&self, processor_name: &str) -> Result<(), EventStoreError> {
        self.ensure_row(processor_name).await?;
        sqlx::query(&format!(
            "UPDATE {} SET position = 0, transaction_id = 0, status = 'running', consecutive_errors = 0, last_error = NULL, updated_at = now() WHERE name = $1",
            self.table
        ))
        .bind(processor_name)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
