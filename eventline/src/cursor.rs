//! A `Cursor` identifies a point in the totally ordered event log.
use std::cmp::Ordering;

/// A point in the event log, identified by the transaction that produced an
/// event and that event's dense position within the log.
///
/// Cursors are ordered first by `transaction_id`, then by `position` —
/// matching the store's visible-to-readers order: all events of an earlier
/// transaction precede all events of a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Cursor {
    pub position: i64,
    pub transaction_id: i64,
}

impl Cursor {
    /// The cursor preceding every event in the log.
    pub const ZERO: Cursor = Cursor {
        position: 0,
        transaction_id: 0,
    };

    pub fn new(position: i64, transaction_id: i64) -> Self {
        Self {
            position,
            transaction_id,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.transaction_id
            .cmp(&other.transaction_id)
            .then_with(|| self.position.cmp(&other.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_orders_by_transaction_then_position() {
        let a = Cursor::new(10, 1);
        let b = Cursor::new(1, 2);
        assert!(a < b, "later transaction always sorts after, regardless of position");

        let c = Cursor::new(1, 1);
        let d = Cursor::new(2, 1);
        assert!(c < d, "same transaction orders by position");
    }

    #[test]
    fn zero_precedes_everything() {
        assert!(Cursor::ZERO < Cursor::new(1, 1));
        assert_eq!(Cursor::ZERO, Cursor::default());
    }
}
