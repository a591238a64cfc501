//! A view's own write side: whatever table(s) back its read model.
use async_trait::async_trait;
use eventline::RawEvent;
use sqlx::{PgConnection, Postgres, Transaction};

use crate::Error;

/// Projects a batch of events into a view's own storage, inside a
/// transaction the framework owns: the whole batch's side effects commit
/// or roll back together (spec.md §4.7).
///
/// Implementations must be idempotent under replay -- the same batch can
/// be delivered twice if the progress-tracker's separate commit is lost
/// after this transaction already committed.
#[async_trait]
pub trait ViewProjector: Send + Sync {
    async fn handle_batch(&self, events: &[RawEvent], conn: &mut PgConnection) -> Result<(), Error>;
}

pub(crate) async fn run_in_transaction<'a, V: ViewProjector + ?Sized>(
    projector: &V,
    events: &[RawEvent],
    mut tx: Transaction<'a, Postgres>,
) -> Result<(), Error> {
    projector.handle_batch(events, &mut tx).await?;
    tx.commit().await?;
    Ok(())
}
