use thiserror::Error;

/// Represents all the ways a method in this crate can fail.
#[derive(Error, Debug)]
pub enum Error {
    /// Error returned from the database.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    /// An error occurred while deserializing an event or command payload.
    #[error(transparent)]
    Deserialization(#[from] eventline_serde::Error),
    /// `append_if`'s decision query was invalidated by a concurrently
    /// committed event.
    #[error("concurrent modification error")]
    Concurrency,
    /// `append_if`'s idempotency clause matched an existing event.
    #[error("duplicate operation")]
    Duplicate,
}

impl From<Error> for eventline::EventStoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::Concurrency => eventline::EventStoreError::ConcurrencyConflict,
            Error::Duplicate => eventline::EventStoreError::DuplicateOperation,
            other => eventline::EventStoreError::storage(other),
        }
    }
}
