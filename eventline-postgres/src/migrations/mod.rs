//! Database initialization for the event store, command log, and the two
//! processor progress tables.
//!
//! The migrator applies a fixed, ordered set of embedded `.sql` files. This
//! workspace has no versioned-migration story beyond that fixed set —
//! schema evolution tooling is explicitly out of scope (spec.md §1).
use sqlx::PgPool;

use crate::Error;

const MIGRATIONS: &[&str] = &[
    include_str!("sql/001_table_events.sql"),
    include_str!("sql/002_table_commands.sql"),
    include_str!("sql/003_table_outbox_progress.sql"),
    include_str!("sql/004_table_view_progress.sql"),
    include_str!("sql/005_fn_append_events_batch.sql"),
    include_str!("sql/006_fn_append_events_if.sql"),
];

/// Applies the fixed schema to `pool`. Idempotent: every statement uses
/// `IF NOT EXISTS`/`CREATE OR REPLACE`, so running it against an
/// already-migrated database is a no-op.
pub struct Migrator<'a> {
    pool: &'a PgPool,
}

impl<'a> Migrator<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn run(&self) -> Result<(), Error> {
        for migration in MIGRATIONS {
            sqlx::query(migration).execute(self.pool).await?;
        }
        Ok(())
    }
}
