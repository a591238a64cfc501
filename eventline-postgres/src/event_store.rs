//! PostgreSQL-backed [`eventline::EventStore`].
mod criteria;
#[cfg(test)]
mod tests;

use std::str::FromStr;

use async_trait::async_trait;
use eventline::{AppendCondition, AppendOutcome, Cursor, EventStoreError, NewEvent, Query, RawEvent, Tag};
use sqlx::postgres::Postgres;
use sqlx::{PgPool, Row, Transaction};

use crate::Error;

/// The pooled, top-level event store. Cheap to clone (wraps a `PgPool`).
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Wraps an already-migrated pool. Run [`crate::Migrator`] separately
    /// at startup.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begins a transaction and wraps it as a [`TxEventStore`], so command
    /// handlers and batch handlers can read and write through the same
    /// `EventStore` interface the pooled store exposes. Transactions begun
    /// from a `PgPool` (rather than a single checked-out connection) are
    /// `'static` in sqlx, so `TxEventStore` carries no borrow back to `self`.
    pub async fn begin(&self) -> Result<TxEventStore, Error> {
        Ok(TxEventStore {
            tx: tokio::sync::Mutex::new(self.pool.begin().await?),
        })
    }
}

/// An `EventStore` scoped to one open transaction -- what command handlers
/// and processor batch handlers actually see, so a handler's reads and its
/// eventual `append_if` observe the same snapshot.
///
/// `EventStore`'s methods take `&self`, but a `sqlx::Transaction` needs a
/// mutable borrow for every query; the transaction lives behind a `Mutex`
/// so one `TxEventStore` can still be shared through `&ES` the way the
/// trait requires, even though in practice only one task at a time drives
/// a given command or batch to completion.
pub struct TxEventStore {
    tx: tokio::sync::Mutex<Transaction<'static, Postgres>>,
}

impl TxEventStore {
    pub async fn commit(self) -> Result<(), Error> {
        self.tx.into_inner().commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), Error> {
        self.tx.into_inner().rollback().await?;
        Ok(())
    }

    /// Inserts the command row the command pipeline stores alongside the
    /// events it produced, keyed by the transaction that appended them.
    pub(crate) async fn store_command(
        &self,
        command_type: &str,
        data: serde_json::Value,
        metadata: Option<serde_json::Value>,
        transaction_id: i64,
        occurred_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), Error> {
        let mut tx = self.tx.lock().await;
        sqlx::query(
            "INSERT INTO commands (transaction_id, command_type, data, metadata, occurred_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(transaction_id)
        .bind(command_type)
        .bind(data)
        .bind(metadata)
        .bind(occurred_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

async fn query_rows<'e, E>(executor: E, query: &Query, after: Cursor) -> Result<Vec<RawEvent>, Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let mut builder = sqlx::QueryBuilder::new(
        "SELECT position, transaction_id, event_type, tags, payload, occurred_at FROM events WHERE (transaction_id, position) > (",
    );
    builder.push_bind(after.transaction_id);
    builder.push(", ");
    builder.push_bind(after.position);
    builder.push(") AND ");
    criteria::push_query_where(&mut builder, query);
    builder.push(" ORDER BY transaction_id ASC, position ASC");

    let rows = builder.build().fetch_all(executor).await?;
    rows.iter().map(row_to_raw_event).collect()
}

fn row_to_raw_event(row: &sqlx::postgres::PgRow) -> Result<RawEvent, Error> {
    let raw_tags: Vec<String> = row.try_get("tags")?;
    let tags = raw_tags
        .iter()
        .map(|t| Tag::from_str(t))
        .collect::<Result<_, _>>()
        .expect("tags stored by this crate always round-trip through Tag::to_string");
    Ok(RawEvent {
        position: row.try_get("position")?,
        transaction_id: row.try_get("transaction_id")?,
        event_type: row.try_get("event_type")?,
        tags,
        payload: row.try_get("payload")?,
        occurred_at: row.try_get("occurred_at")?,
    })
}

fn events_to_json(events: &[NewEvent]) -> serde_json::Value {
    serde_json::Value::Array(
        events
            .iter()
            .map(|e| {
                serde_json::json!({
                    "event_type": e.event_type,
                    "tags": e.tags.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
                    "payload": e.payload,
                    "occurred_at": e.occurred_at,
                })
            })
            .collect(),
    )
}

async fn append_batch<'e, E>(executor: E, events: Vec<NewEvent>) -> Result<(), Error>
where
    E: sqlx::PgExecutor<'e>,
{
    if events.is_empty() {
        return Ok(());
    }
    sqlx::query("SELECT * FROM append_events_batch($1)")
        .bind(events_to_json(&events))
        .execute(executor)
        .await?;
    Ok(())
}

async fn append_if<'e, E>(
    executor: E,
    events: Vec<NewEvent>,
    condition: AppendCondition,
) -> Result<AppendOutcome, Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let decision_items = criteria::query_to_items(&condition.query);
    let idempotency_items = condition.idempotency.as_ref().map(criteria::item_to_items);
    // `None` binds SQL NULL, which the stored procedure reads as "skip the
    // fencing check entirely" (spec.md §4.1.2 step 1's "only if
    // `after_cursor_txid` is provided").
    let after_transaction_id = condition.after.map(|c| c.transaction_id);
    let after_position = condition.after.map(|c| c.position);

    let result: serde_json::Value = sqlx::query_scalar(
        "SELECT append_events_if($1, $2, $3, $4, $5)",
    )
    .bind(events_to_json(&events))
    .bind(decision_items)
    .bind(after_transaction_id)
    .bind(after_position)
    .bind(idempotency_items)
    .fetch_one(executor)
    .await?;

    let success = result["success"].as_bool().unwrap_or(false);
    if !success {
        return match result["error_code"].as_str() {
            Some("CURSOR_VIOLATION") => Err(Error::Concurrency),
            Some("IDEMPOTENCY_VIOLATION") => Err(Error::Duplicate),
            other => unreachable!("append_events_if returned an unexpected error_code: {other:?}"),
        };
    }

    // An empty `events` list is a no-op: nothing is inserted, and
    // `transaction_id`/`position` come back JSON-null. Fall back to the
    // condition's own cursor (or the zero cursor, if there was none) so
    // the outcome still reports a coherent cursor.
    let fallback = condition.after.unwrap_or(Cursor::ZERO);
    let transaction_id = result["transaction_id"].as_i64().unwrap_or(fallback.transaction_id);
    let position = result["position"].as_i64().unwrap_or(fallback.position);
    Ok(AppendOutcome {
        transaction_id,
        events_count: result["events_count"].as_u64().unwrap_or(0) as usize,
        cursor: Cursor::new(position, transaction_id),
    })
}

#[async_trait]
impl eventline::EventStore for PgEventStore {
    async fn append(&self, events: Vec<NewEvent>) -> Result<(), EventStoreError> {
        append_batch(&self.pool, events).await.map_err(Into::into)
    }

    async fn append_if(
        &self,
        events: Vec<NewEvent>,
        condition: AppendCondition,
    ) -> Result<AppendOutcome, EventStoreError> {
        append_if(&self.pool, events, condition).await.map_err(Into::into)
    }

    async fn query(&self, query: &Query, after: Cursor) -> Result<Vec<RawEvent>, EventStoreError> {
        query_rows(&self.pool, query, after).await.map_err(Into::into)
    }
}

#[async_trait]
impl eventline::EventStore for TxEventStore {
    async fn append(&self, events: Vec<NewEvent>) -> Result<(), EventStoreError> {
        let mut tx = self.tx.lock().await;
        append_batch(&mut **tx, events).await.map_err(Into::into)
    }

    async fn append_if(
        &self,
        events: Vec<NewEvent>,
        condition: AppendCondition,
    ) -> Result<AppendOutcome, EventStoreError> {
        let mut tx = self.tx.lock().await;
        append_if(&mut **tx, events, condition).await.map_err(Into::into)
    }

    async fn query(&self, query: &Query, after: Cursor) -> Result<Vec<RawEvent>, EventStoreError> {
        let mut tx = self.tx.lock().await;
        query_rows(&mut **tx, query, after).await.map_err(Into::into)
    }
}
