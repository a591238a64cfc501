//! Error kinds shared across the event store, command pipeline, and
//! processor framework (spec.md §7).
use std::error::Error as StdError;

/// Errors an [`crate::EventStore`] can return.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// `append_if` was aborted by the fencing check: an event matching the
    /// decision model was committed after the caller's cursor.
    #[error("concurrency conflict: a new event invalidates the decision model")]
    ConcurrencyConflict,

    /// `append_if` was aborted by the idempotency check: an event matching
    /// the idempotency clause already exists in the log.
    #[error("duplicate operation: an event matching the idempotency clause already exists")]
    DuplicateOperation,

    /// Any other storage failure (connection lost, timeout, constraint
    /// violation unrelated to DCB).
    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn StdError + Send + Sync>),
}

impl EventStoreError {
    pub fn storage(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }

    pub fn is_duplicate_operation(&self) -> bool {
        matches!(self, Self::DuplicateOperation)
    }
}

/// Errors the command pipeline can surface to its caller.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No handler is registered for the command's type.
    #[error("no handler registered for command type {0:?}")]
    UnknownCommandType(String),

    /// The command failed domain validation before reaching the store.
    /// Never retried by the core.
    #[error("invalid command: {0}")]
    InvalidCommand(#[source] Box<dyn StdError + Send + Sync>),

    /// The event store rejected the append.
    #[error(transparent)]
    Store(#[from] EventStoreError),
}

impl CommandError {
    pub fn invalid(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::InvalidCommand(Box::new(err))
    }
}

/// Raised when two handlers are registered for the same command type.
#[derive(Debug, thiserror::Error)]
#[error("a handler is already registered for command type {0:?}")]
pub struct DuplicateRegistration(pub String);
