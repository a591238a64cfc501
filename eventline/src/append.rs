//! The result of a successful `append_if`.
use crate::Cursor;

/// What `append_if` returns when the write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub transaction_id: i64,
    pub events_count: usize,
    pub cursor: Cursor,
}
