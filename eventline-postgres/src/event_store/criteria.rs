//! Translates the storage-agnostic [`eventline::Query`] into the JSON shape
//! `append_events_if`/the row-fetch query expect: an array of
//! `{event_types, tags}` objects, one per [`eventline::QueryItem`].
use eventline::{Query, QueryItem};

/// Serializes `query` the way `append_events_if`'s decision/idempotency
/// parameters expect: `Query::empty()` (matches everything) becomes a
/// single catch-all item rather than an empty array, since an empty JSON
/// array would instead mean "this item list matches nothing".
pub fn query_to_items(query: &Query) -> serde_json::Value {
    if query.is_empty() {
        return serde_json::json!([{ "event_types": [], "tags": [] }]);
    }
    serde_json::Value::Array(query.items().iter().map(item_to_json).collect())
}

pub fn item_to_items(item: &QueryItem) -> serde_json::Value {
    serde_json::Value::Array(vec![item_to_json(item)])
}

fn item_to_json(item: &QueryItem) -> serde_json::Value {
    serde_json::json!({
        "event_types": item.event_types,
        "tags": item.tags.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
    })
}

/// Builds the `WHERE` fragment for a plain row fetch (`EventStore::query`),
/// using bound parameters exclusively -- no value from `query` is ever
/// interpolated into the SQL text.
pub fn push_query_where(builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>, query: &Query) {
    if query.is_empty() {
        builder.push("true");
        return;
    }
    builder.push("(");
    for (i, item) in query.items().iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push("(");
        if item.event_types.is_empty() {
            builder.push("true");
        } else {
            builder.push("event_type = ANY(");
            builder.push_bind(item.event_types.clone());
            builder.push(")");
        }
        builder.push(" AND tags @> ");
        let tags: Vec<String> = item.tags.iter().map(|t| t.to_string()).collect();
        builder.push_bind(tags);
        builder.push(")");
    }
    builder.push(")");
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventline::Tag;

    #[test]
    fn empty_query_serializes_to_a_single_catch_all_item() {
        let items = query_to_items(&Query::empty());
        assert_eq!(items, serde_json::json!([{ "event_types": [], "tags": [] }]));
    }

    #[test]
    fn a_query_item_carries_its_types_and_tags() {
        let item = QueryItem::new()
            .with_types(["Deposited"])
            .with_tag(Tag::new("wallet_id", "W1").unwrap());
        let items = query_to_items(&Query::item(item));
        assert_eq!(
            items,
            serde_json::json!([{ "event_types": ["Deposited"], "tags": ["wallet_id=W1"] }])
        );
    }
}
