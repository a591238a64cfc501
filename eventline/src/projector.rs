//! Pure folds over the event log into in-memory state (spec.md §4.4).
use crate::event::RawEvent;
use crate::query::Query;
use crate::Cursor;

/// A pure, total, deterministic fold from events into a state of type `S`.
///
/// Implementations must be thread-confined: the framework never shares one
/// instance across concurrent tasks, and never hands the cursor to the
/// projector — the cursor belongs to the event store, not the state.
pub trait StateProjector: Send {
    type State;

    /// A stable identifier for this projector (used in diagnostics and by
    /// snapshotting-style callers; not interpreted by the store).
    fn id(&self) -> &'static str;

    /// The event-type and tag filter that selects events this projector
    /// cares about.
    fn query(&self) -> Query;

    /// Applies one matching event to the state in place.
    fn apply(&self, state: &mut Self::State, event: &RawEvent);
}

/// The result of a call to `EventStore::project`: the folded state and the
/// cursor of the last event consumed (or the input cursor, unchanged, if
/// nothing matched).
#[derive(Debug, Clone)]
pub struct ProjectionResult<S> {
    pub state: S,
    pub cursor: Cursor,
}

impl<S> ProjectionResult<S> {
    pub fn into_parts(self) -> (S, Cursor) {
        (self.state, self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryItem;
    use crate::tag::TagSet;
    use chrono::Utc;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Balance(i64);

    struct BalanceProjector;

    impl StateProjector for BalanceProjector {
        type State = Balance;

        fn id(&self) -> &'static str {
            "balance"
        }

        fn query(&self) -> Query {
            Query::item(QueryItem::new().with_types(["Deposited", "Withdrawn"]))
        }

        fn apply(&self, state: &mut Self::State, event: &RawEvent) {
            let amount = event.payload["amount"].as_i64().unwrap_or(0);
            match event.event_type.as_str() {
                "Deposited" => state.0 += amount,
                "Withdrawn" => state.0 -= amount,
                _ => {}
            }
        }
    }

    fn raw(event_type: &str, amount: i64, position: i64) -> RawEvent {
        RawEvent {
            position,
            transaction_id: position,
            event_type: event_type.to_string(),
            tags: TagSet::new(),
            payload: serde_json::json!({ "amount": amount }),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn it_folds_matching_events_in_order() {
        let projector = BalanceProjector;
        let mut state = Balance::default();
        for event in [raw("Deposited", 100, 1), raw("Withdrawn", 40, 2)] {
            projector.apply(&mut state, &event);
        }
        assert_eq!(state, Balance(60));
    }

    #[test]
    fn a_projector_with_no_matching_events_leaves_state_untouched() {
        let projector = BalanceProjector;
        let mut state = Balance::default();
        let unrelated = raw("SomethingElse", 999, 1);
        if projector.query().matches_event(&unrelated) {
            projector.apply(&mut state, &unrelated);
        }
        assert_eq!(state, Balance::default());
    }
}
