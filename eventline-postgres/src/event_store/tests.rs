use assert2::{check, let_assert};
use eventline::{new_event, tags, AppendCondition, Cursor, Event, EventStore, EventStoreError, Query, QueryItem};
use serde::Serialize;
use sqlx::PgPool;

use crate::migrations::Migrator;
use crate::PgEventStore;

#[derive(Debug, Clone)]
enum WalletEvent {
    Opened { wallet_id: String },
    Deposited { wallet_id: String, amount: i64 },
}

impl Event for WalletEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WalletEvent::Opened { .. } => "Opened",
            WalletEvent::Deposited { .. } => "Deposited",
        }
    }

    fn tags(&self) -> eventline::TagSet {
        match self {
            WalletEvent::Opened { wallet_id } | WalletEvent::Deposited { wallet_id, .. } => {
                tags! { "wallet_id" => wallet_id.clone() }
            }
        }
    }
}

impl serde::Serialize for WalletEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WalletEvent::Opened { wallet_id } => {
                serde_json::json!({ "wallet_id": wallet_id }).serialize(serializer)
            }
            WalletEvent::Deposited { wallet_id, amount } => {
                serde_json::json!({ "wallet_id": wallet_id, "amount": amount }).serialize(serializer)
            }
        }
    }
}

#[sqlx::test]
async fn it_appends_and_queries_events(pool: PgPool) {
    Migrator::new(&pool).run().await.unwrap();
    let store = PgEventStore::new(pool);

    let event = new_event(&WalletEvent::Opened { wallet_id: "W1".to_string() }, chrono::Utc::now()).unwrap();
    store.append(vec![event]).await.unwrap();

    let query = Query::item(QueryItem::new().with_types(["Opened"]));
    let events = store.query(&query, Cursor::ZERO).await.unwrap();

    check!(events.len() == 1);
    check!(events[0].event_type == "Opened");
    check!(events[0].has_tag("wallet_id", "W1"));
}

#[sqlx::test]
async fn append_if_detects_a_conflicting_event_past_the_cursor(pool: PgPool) {
    Migrator::new(&pool).run().await.unwrap();
    let store = PgEventStore::new(pool);

    let decision = Query::item(QueryItem::new().with_tag(eventline::Tag::new("wallet_id", "W1").unwrap()));

    let opened = new_event(&WalletEvent::Opened { wallet_id: "W1".to_string() }, chrono::Utc::now()).unwrap();
    store.append(vec![opened]).await.unwrap();

    let deposited = new_event(
        &WalletEvent::Deposited { wallet_id: "W1".to_string(), amount: 10 },
        chrono::Utc::now(),
    )
    .unwrap();

    let result = store
        .append_if(vec![deposited], AppendCondition::new(decision, Cursor::ZERO))
        .await;

    let_assert!(Err(EventStoreError::ConcurrencyConflict) = result);
}

#[sqlx::test]
async fn append_if_succeeds_when_the_cursor_is_current(pool: PgPool) {
    Migrator::new(&pool).run().await.unwrap();
    let store = PgEventStore::new(pool);

    let opened = new_event(&WalletEvent::Opened { wallet_id: "W1".to_string() }, chrono::Utc::now()).unwrap();
    store.append(vec![opened]).await.unwrap();

    let events = store
        .query(
            &Query::item(QueryItem::new().with_tag(eventline::Tag::new("wallet_id", "W1").unwrap())),
            Cursor::ZERO,
        )
        .await
        .unwrap();
    let cursor = Cursor::new(events.last().unwrap().position, events.last().unwrap().transaction_id);

    let decision = Query::item(QueryItem::new().with_tag(eventline::Tag::new("wallet_id", "W1").unwrap()));
    let deposited = new_event(
        &WalletEvent::Deposited { wallet_id: "W1".to_string(), amount: 10 },
        chrono::Utc::now(),
    )
    .unwrap();

    let outcome = store
        .append_if(vec![deposited], AppendCondition::new(decision, cursor))
        .await
        .unwrap();

    check!(outcome.events_count == 1);
}

#[sqlx::test]
async fn append_if_with_idempotency_rejects_a_second_matching_event(pool: PgPool) {
    Migrator::new(&pool).run().await.unwrap();
    let store = PgEventStore::new(pool);

    let idempotency = QueryItem::new()
        .with_types(["Opened"])
        .with_tag(eventline::Tag::new("wallet_id", "W1").unwrap());

    let opened = new_event(&WalletEvent::Opened { wallet_id: "W1".to_string() }, chrono::Utc::now()).unwrap();
    store
        .append_if(vec![opened], AppendCondition::idempotent(idempotency.clone()))
        .await
        .unwrap();

    let opened_again = new_event(&WalletEvent::Opened { wallet_id: "W1".to_string() }, chrono::Utc::now()).unwrap();
    let result = store
        .append_if(vec![opened_again], AppendCondition::idempotent(idempotency))
        .await;

    let_assert!(Err(EventStoreError::DuplicateOperation) = result);
}

/// An idempotency-only condition has no decision model to fence on, so an
/// unrelated event already in the log (here, another wallet's `Opened`)
/// must not trip a cursor violation -- only a second event matching the
/// idempotency clause itself should be rejected.
#[sqlx::test]
async fn append_if_idempotent_ignores_unrelated_events_already_in_the_log(pool: PgPool) {
    Migrator::new(&pool).run().await.unwrap();
    let store = PgEventStore::new(pool);

    let other_wallet = new_event(&WalletEvent::Opened { wallet_id: "other".to_string() }, chrono::Utc::now()).unwrap();
    store.append(vec![other_wallet]).await.unwrap();

    let idempotency = QueryItem::new()
        .with_types(["Opened"])
        .with_tag(eventline::Tag::new("wallet_id", "W1").unwrap());

    let opened = new_event(&WalletEvent::Opened { wallet_id: "W1".to_string() }, chrono::Utc::now()).unwrap();
    let outcome = store
        .append_if(vec![opened], AppendCondition::idempotent(idempotency))
        .await
        .unwrap();

    check!(outcome.events_count == 1);
}
