//! Wires one view's subscription into the shared
//! [`crate::scheduler::Scheduler`]: fetch by its subscription config,
//! project the matching events inside a dedicated transaction.
use std::sync::Arc;

use async_trait::async_trait;
use eventline::{BatchHandler, Cursor, EventStore, EventStoreError, RawEvent};
use sqlx::PgPool;

use crate::scheduler::EventFetcher;
use crate::views::config::ViewSubscriptionConfig;
use crate::views::projector::{run_in_transaction, ViewProjector};

pub struct ViewFetcher<ES: EventStore> {
    store: ES,
    config: ViewSubscriptionConfig,
}

impl<ES: EventStore> ViewFetcher<ES> {
    pub fn new(store: ES, config: ViewSubscriptionConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl<ES: EventStore + 'static> EventFetcher for ViewFetcher<ES> {
    type Event = RawEvent;

    async fn fetch(&self, after: Cursor, batch_size: usize) -> Result<Vec<RawEvent>, EventStoreError> {
        let mut events = self.store.query(&self.config.fetch_query(), after).await?;
        events.truncate(batch_size);
        Ok(events)
    }

    fn cursor_of(&self, event: &RawEvent) -> Cursor {
        Cursor::new(event.position, event.transaction_id)
    }
}

pub struct ViewBatchHandler<V: ViewProjector> {
    config: ViewSubscriptionConfig,
    projector: Arc<V>,
    pool: PgPool,
}

impl<V: ViewProjector> ViewBatchHandler<V> {
    pub fn new(config: ViewSubscriptionConfig, projector: V, pool: PgPool) -> Self {
        Self { config, projector: Arc::new(projector), pool }
    }
}

#[async_trait]
impl<V: ViewProjector + 'static> BatchHandler for ViewBatchHandler<V> {
    type Event = RawEvent;

    async fn handle_batch(&self, events: &[RawEvent]) -> Result<(), EventStoreError> {
        let matching: Vec<RawEvent> = events.iter().filter(|e| self.config.matches(e)).cloned().collect();
        if matching.is_empty() {
            return Ok(());
        }
        let tx = self.pool.begin().await.map_err(crate::Error::Database)?;
        run_in_transaction(self.projector.as_ref(), &matching, tx)
            .await
            .map_err(EventStoreError::from)
    }
}
