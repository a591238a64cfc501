//! Topic routing (spec.md §4.6): a predicate over event tags, independent
//! of the event's type -- an event is routed to a topic iff all three
//! clause kinds hold, and may fan out to several topics.
use eventline::{Query, QueryItem, RawEvent, Tag, TagSet};

/// Three clause kinds, all of which must hold for an event to route to
/// this topic. An unset clause (empty set) is vacuously true.
#[derive(Debug, Clone, Default)]
pub struct TopicPredicate {
    /// Every key here must have some value present on the event.
    required_keys: Vec<String>,
    /// At least one of these exact tags must be present.
    any_of: TagSet,
    /// Every one of these exact tags must be present.
    exact: TagSet,
}

impl TopicPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_key(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    pub fn any_of(mut self, tag: Tag) -> Self {
        self.any_of.insert(tag);
        self
    }

    pub fn exact(mut self, tag: Tag) -> Self {
        self.exact.insert(tag);
        self
    }

    pub fn matches(&self, event: &RawEvent) -> bool {
        let required_ok = self
            .required_keys
            .iter()
            .all(|key| event.tags.iter().any(|t| t.key() == key));
        let any_of_ok = self.any_of.is_empty() || self.any_of.iter().any(|t| event.tags.contains(t));
        let exact_ok = self.exact.iter().all(|t| event.tags.contains(t));
        required_ok && any_of_ok && exact_ok
    }

    /// A superset fetch query: every `exact` tag narrows the fetch (an
    /// event must carry it to match at all), but `required_keys` and
    /// `any_of` cannot be expressed as a tag-value query, so they are
    /// re-checked client-side by [`TopicPredicate::matches`] after fetch.
    fn fetch_query_item(&self) -> QueryItem {
        QueryItem::new().with_tags(self.exact.iter().cloned())
    }
}

/// A named routing destination: events matching `predicate` are delivered
/// to every publisher subscribed to this topic.
#[derive(Debug, Clone)]
pub struct Topic {
    pub name: String,
    pub predicate: TopicPredicate,
}

impl Topic {
    pub fn new(name: impl Into<String>, predicate: TopicPredicate) -> Self {
        Self { name: name.into(), predicate }
    }

    pub fn matches(&self, event: &RawEvent) -> bool {
        self.predicate.matches(event)
    }

    pub fn fetch_query(&self) -> Query {
        Query::item(self.predicate.fetch_query_item())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event_with_tags(tags: TagSet) -> RawEvent {
        RawEvent {
            position: 1,
            transaction_id: 1,
            event_type: "Deposited".to_string(),
            tags,
            payload: serde_json::json!({}),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn required_key_must_be_present_with_any_value() {
        let predicate = TopicPredicate::new().require_key("wallet_id");
        let mut tags = TagSet::new();
        tags.insert(Tag::new("wallet_id", "W1").unwrap());
        assert!(predicate.matches(&event_with_tags(tags)));
        assert!(!predicate.matches(&event_with_tags(TagSet::new())));
    }

    #[test]
    fn any_of_requires_at_least_one_exact_tag() {
        let predicate = TopicPredicate::new()
            .any_of(Tag::new("currency", "USD").unwrap())
            .any_of(Tag::new("currency", "EUR").unwrap());
        let mut usd = TagSet::new();
        usd.insert(Tag::new("currency", "USD").unwrap());
        assert!(predicate.matches(&event_with_tags(usd)));

        let mut gbp = TagSet::new();
        gbp.insert(Tag::new("currency", "GBP").unwrap());
        assert!(!predicate.matches(&event_with_tags(gbp)));
    }

    #[test]
    fn exact_requires_every_listed_pair() {
        let predicate = TopicPredicate::new().exact(Tag::new("currency", "USD").unwrap());
        assert!(!predicate.matches(&event_with_tags(TagSet::new())));
    }
}
