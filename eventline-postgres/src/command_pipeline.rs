//! Postgres-specific half of the command pipeline (spec.md §4.3): runs the
//! registered handler against a transaction-scoped store, appends its
//! events under its append condition, records the command row, and commits
//! all of it as one unit.
use chrono::Utc;
use eventline::{Command, CommandError, CommandRegistry, EventStore, EventStoreError};

use crate::event_store::{PgEventStore, TxEventStore};

/// Wraps a [`CommandRegistry`] and a [`PgEventStore`], giving callers a
/// single `dispatch` entry point instead of the transaction-scoping,
/// append, and command-logging steps the teacher's `executeInTransaction`
/// pattern otherwise leaves to every call site.
pub struct CommandPipeline {
    registry: CommandRegistry<TxEventStore>,
    store: PgEventStore,
}

/// The outcome of a successfully dispatched command.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub transaction_id: i64,
    pub events_count: usize,
}

impl CommandPipeline {
    pub fn new(store: PgEventStore, registry: CommandRegistry<TxEventStore>) -> Self {
        Self { registry, store }
    }

    /// Dispatches `command`: runs its handler inside a fresh transaction,
    /// appends the resulting events under their append condition, stores
    /// the command row keyed by the resulting transaction id, and commits.
    ///
    /// A `ConcurrencyConflict` or a handler-level `InvalidCommand` rolls
    /// the transaction back and leaves no trace, per spec.md §4.3 -- the
    /// pipeline never retries automatically.
    pub async fn dispatch(&self, command: &dyn Command) -> Result<DispatchOutcome, CommandError> {
        let tx_store = self.store.begin().await.map_err(|e| CommandError::Store(e.into()))?;

        let result = match self.registry.dispatch(&tx_store, command).await {
            Ok(result) => result,
            Err(err) => {
                let _ = tx_store.rollback().await;
                return Err(err);
            }
        };

        let events_count = result.events.len();
        let outcome = match tx_store.append_if(result.events, result.condition).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = tx_store.rollback().await;
                return Err(CommandError::Store(err));
            }
        };

        if let Err(err) = tx_store
            .store_command(
                command.command_type(),
                command.to_json(),
                command.metadata(),
                outcome.transaction_id,
                Utc::now(),
            )
            .await
        {
            let _ = tx_store.rollback().await;
            return Err(CommandError::Store(EventStoreError::from(err)));
        }

        tx_store
            .commit()
            .await
            .map_err(|e| CommandError::Store(EventStoreError::from(e)))?;

        Ok(DispatchOutcome {
            transaction_id: outcome.transaction_id,
            events_count,
        })
    }
}
