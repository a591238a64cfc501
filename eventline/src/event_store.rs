//! The storage-agnostic `EventStore` surface (spec.md §4.2).
use async_trait::async_trait;

use crate::append::AppendOutcome;
use crate::error::EventStoreError;
use crate::event::{NewEvent, RawEvent};
use crate::projector::{ProjectionResult, StateProjector};
use crate::query::{union_all, AppendCondition, Query};
use crate::Cursor;

/// The event store's public operations.
///
/// Implementations are expected to be cheap to clone (a connection pool
/// handle) and safe to share across tasks. `eventline-postgres::PgEventStore`
/// is the only implementation in this workspace; the trait exists so the
/// command pipeline and processor framework can be written once against an
/// abstract store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events with no concurrency check. Used when the caller
    /// already owns the consistency contract (seeding, replay).
    async fn append(&self, events: Vec<NewEvent>) -> Result<(), EventStoreError>;

    /// Appends events iff `condition` holds, atomically with the check.
    /// Returns the transaction id of the write on success.
    async fn append_if(
        &self,
        events: Vec<NewEvent>,
        condition: AppendCondition,
    ) -> Result<AppendOutcome, EventStoreError>;

    /// Returns events matching `query`, strictly after `after`, ordered
    /// ascending by `(transaction_id, position)`.
    async fn query(&self, query: &Query, after: Cursor) -> Result<Vec<RawEvent>, EventStoreError>;

    /// Runs one query covering the union of every projector's filter, then
    /// folds each matching event through every projector whose filter
    /// matches it, in registration order.
    async fn project<S>(
        &self,
        init: S,
        projectors: &[&(dyn StateProjector<State = S> + Sync)],
        after: Cursor,
    ) -> Result<ProjectionResult<S>, EventStoreError>
    where
        S: Send + 'static,
    {
        let combined = union_all(projectors.iter().map(|p| p.query()));

        let events = self.query(&combined, after).await?;
        let mut state = init;
        let mut cursor = after;
        for event in &events {
            for projector in projectors {
                if projector.query().matches_event(event) {
                    projector.apply(&mut state, event);
                }
            }
            cursor = Cursor::new(event.position, event.transaction_id);
        }
        Ok(ProjectionResult { state, cursor })
    }
}
