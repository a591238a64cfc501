//! View subscription registration (spec.md §4.7): a list of event types
//! plus the same tag-predicate clauses outbox topics use.
use eventline::{Query, QueryItem, RawEvent};

use crate::outbox::TopicPredicate;

/// What a view subscribes to: its own name (the processor name progress is
/// tracked under), the event types it cares about, and a tag predicate
/// reusing the outbox's required/anyOf/exact clause shapes.
#[derive(Debug, Clone)]
pub struct ViewSubscriptionConfig {
    pub view_name: String,
    pub event_types: Vec<String>,
    pub predicate: TopicPredicate,
}

impl ViewSubscriptionConfig {
    pub fn new(view_name: impl Into<String>, event_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            view_name: view_name.into(),
            event_types: event_types.into_iter().map(Into::into).collect(),
            predicate: TopicPredicate::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: TopicPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn matches(&self, event: &RawEvent) -> bool {
        (self.event_types.is_empty() || self.event_types.iter().any(|t| t == &event.event_type))
            && self.predicate.matches(event)
    }

    /// A superset fetch query narrowing by event type; the predicate's
    /// `required`/`anyOf` clauses are re-checked client-side, same as the
    /// outbox topic they're borrowed from.
    pub fn fetch_query(&self) -> Query {
        Query::item(QueryItem::new().with_types(self.event_types.clone()))
    }
}
