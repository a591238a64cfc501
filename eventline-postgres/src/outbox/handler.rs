//! Wires one `(topic, publisher)` subscription into the shared
//! [`crate::scheduler::Scheduler`]: the fetcher narrows by the topic's
//! tag-expressible clauses and the handler re-checks the full predicate
//! (required/anyOf/exact) before publishing (spec.md §4.6).
use std::sync::Arc;

use async_trait::async_trait;
use eventline::{BatchHandler, Cursor, EventStore, EventStoreError, RawEvent};

use crate::outbox::publisher::Publisher;
use crate::outbox::topic::Topic;
use crate::scheduler::EventFetcher;

pub struct OutboxFetcher<ES: EventStore> {
    store: ES,
    topic: Topic,
}

impl<ES: EventStore> OutboxFetcher<ES> {
    pub fn new(store: ES, topic: Topic) -> Self {
        Self { store, topic }
    }
}

#[async_trait]
impl<ES: EventStore + 'static> EventFetcher for OutboxFetcher<ES> {
    type Event = RawEvent;

    async fn fetch(&self, after: Cursor, batch_size: usize) -> Result<Vec<RawEvent>, EventStoreError> {
        let mut events = self.store.query(&self.topic.fetch_query(), after).await?;
        events.truncate(batch_size);
        Ok(events)
    }

    fn cursor_of(&self, event: &RawEvent) -> Cursor {
        Cursor::new(event.position, event.transaction_id)
    }
}

/// Publishes every event in a batch that actually matches the topic's
/// full predicate, in `(transaction_id, position)` order -- the order the
/// batch already arrives in (spec.md §4.6 "Order within a topic is
/// preserved").
pub struct OutboxBatchHandler {
    topic: Topic,
    publisher: Arc<dyn Publisher>,
}

impl OutboxBatchHandler {
    pub fn new(topic: Topic, publisher: Arc<dyn Publisher>) -> Self {
        Self { topic, publisher }
    }
}

#[async_trait]
impl BatchHandler for OutboxBatchHandler {
    type Event = RawEvent;

    async fn handle_batch(&self, events: &[RawEvent]) -> Result<(), EventStoreError> {
        let matching: Vec<RawEvent> = events.iter().filter(|e| self.topic.matches(e)).cloned().collect();
        if matching.is_empty() {
            return Ok(());
        }
        self.publisher.publish_batch(&self.topic.name, &matching).await
    }
}
