//! Queries describe which events are relevant to a decision, a projection,
//! a topic, or a view: a disjunction of [`QueryItem`]s, each itself a
//! conjunction of a type-set and a tag-set.
use crate::tag::{Tag, TagSet};
use crate::event::RawEvent;

/// One clause of a [`Query`]: matches an event whose type is *any* of
/// `event_types` (or `event_types` is empty, meaning "any type") AND whose
/// tags are a superset of `tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryItem {
    pub event_types: Vec<String>,
    pub tags: TagSet,
}

impl QueryItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.event_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// True if `event` matches this clause.
    pub fn matches(&self, event_type: &str, tags: &TagSet) -> bool {
        let type_matches = self.event_types.is_empty()
            || self.event_types.iter().any(|t| t == event_type);
        let tags_match = self.tags.is_subset(tags);
        type_matches && tags_match
    }
}

/// A disjunction of [`QueryItem`]s: an event matches the query if it
/// matches any item. An empty query (`Query::empty()`) matches every
/// event — this is a special case, not an empty disjunction (which would
/// match nothing).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    items: Vec<QueryItem>,
}

impl Query {
    /// A query matching every event.
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn new(items: impl IntoIterator<Item = QueryItem>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn item(item: QueryItem) -> Self {
        Self { items: vec![item] }
    }

    pub fn items(&self) -> &[QueryItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Combines this query with `other` into a single disjunction covering
    /// both — used to fuse multiple projectors' filters into one fetch.
    pub fn union(mut self, other: Query) -> Query {
        if self.is_empty() || other.is_empty() {
            return Query::empty();
        }
        self.items.extend(other.items);
        self
    }

    pub fn matches(&self, event_type: &str, tags: &TagSet) -> bool {
        self.is_empty() || self.items.iter().any(|item| item.matches(event_type, tags))
    }

    pub fn matches_event(&self, event: &RawEvent) -> bool {
        self.matches(&event.event_type, &event.tags)
    }
}

/// Unions a sequence of queries into one, short-circuiting to
/// `Query::empty()` (match everything) as soon as any input query is
/// itself empty — distinct from folding with `Query::union`'s pairwise
/// absorbing-empty semantics starting from a non-existent "matches
/// nothing" neutral element.
pub fn union_all(queries: impl IntoIterator<Item = Query>) -> Query {
    let mut items = Vec::new();
    for q in queries {
        if q.is_empty() {
            return Query::empty();
        }
        items.extend(q.items);
    }
    Query::new(items)
}

impl FromIterator<QueryItem> for Query {
    fn from_iter<T: IntoIterator<Item = QueryItem>>(iter: T) -> Self {
        Query::new(iter)
    }
}

/// Bundles the decision model (a [`Query`]) with the fencing [`Cursor`] and
/// an optional idempotency clause — the optimistic-concurrency contract an
/// `append_if` call commits to.
///
/// `after` is `None` to mean "no fencing check at all" (spec.md §4.1.2
/// step 1 runs "only if `after_cursor_txid` is provided") — distinct from
/// `Some(Cursor::ZERO)`, which fences on the empty prefix of the log and so
/// conflicts with *any* event matching `query`. An idempotency-only append
/// (see [`AppendCondition::idempotent`]) has no decision model to fence on
/// and must use `None`, not `Cursor::ZERO`.
#[derive(Debug, Clone)]
pub struct AppendCondition {
    pub query: Query,
    pub after: Option<crate::Cursor>,
    pub idempotency: Option<QueryItem>,
}

impl AppendCondition {
    /// Fences on `query` after `after`, with no idempotency check.
    pub fn new(query: Query, after: crate::Cursor) -> Self {
        Self {
            query,
            after: Some(after),
            idempotency: None,
        }
    }

    /// An idempotency-only condition: no fencing check at all (`after` is
    /// `None`), just the idempotency clause. Use this, not
    /// `new(Query::empty(), Cursor::ZERO).with_idempotency(..)`, when the
    /// caller has no decision model to fence on — the latter would fence
    /// on the empty prefix and reject on *any* existing event, never
    /// reaching the idempotency check.
    pub fn idempotent(idempotency: QueryItem) -> Self {
        Self {
            query: Query::empty(),
            after: None,
            idempotency: Some(idempotency),
        }
    }

    /// Adds an idempotency clause: the append fails with
    /// `DuplicateOperation` if any event anywhere in the log (regardless of
    /// cursor) already matches `idempotency`.
    pub fn with_idempotency(mut self, idempotency: QueryItem) -> Self {
        self.idempotency = Some(idempotency);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag;

    #[test]
    fn empty_query_matches_everything() {
        let q = Query::empty();
        assert!(q.matches("Anything", &TagSet::new()));
    }

    #[test]
    fn item_requires_all_tags_and_any_listed_type() {
        let item = QueryItem::new()
            .with_types(["WalletOpened", "DepositMade"])
            .with_tag(tag::Tag::new("wallet_id", "W1").unwrap());

        let mut tags = TagSet::new();
        tags.insert(tag::Tag::new("wallet_id", "W1").unwrap());
        assert!(item.matches("DepositMade", &tags));
        assert!(!item.matches("WithdrawalMade", &tags));

        tags.insert(tag::Tag::new("currency", "USD").unwrap());
        assert!(item.matches("DepositMade", &tags), "superset of required tags still matches");
    }

    #[test]
    fn union_of_two_non_empty_queries_is_their_disjunction() {
        let a = Query::item(QueryItem::new().with_types(["A"]));
        let b = Query::item(QueryItem::new().with_types(["B"]));
        let combined = a.union(b);
        assert_eq!(combined.items().len(), 2);
        assert!(combined.matches("A", &TagSet::new()));
        assert!(combined.matches("B", &TagSet::new()));
        assert!(!combined.matches("C", &TagSet::new()));
    }
}
