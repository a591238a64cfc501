//! The outbox worker (spec.md §4.6): routes events to external sinks by
//! tag-predicate topics, subscription-keyed by `(topic, publisher)`.
mod handler;
mod publisher;
mod topic;

pub use handler::{OutboxBatchHandler, OutboxFetcher};
pub use publisher::{LogPublisher, Publisher, StatsPublisher, TestLatchPublisher};
pub use topic::{Topic, TopicPredicate};

use crate::manager::ProcessorManager;
use crate::progress::PgProgressTracker;

/// The management surface for outbox subscriptions: pause/resume/reset and
/// status/detail lookups, keyed by `"{topic}:{publisher}"`.
pub type OutboxManager = ProcessorManager<PgProgressTracker>;

/// Builds the subscription name a scheduler registers an outbox
/// `(topic, publisher)` pair under.
pub fn subscription_name(topic: &str, publisher: &str) -> String {
    format!("{topic}:{publisher}")
}

/// The shared advisory-lock key used under `LockStrategy::Global`, the
/// outbox's default (spec.md §4.6 "Lock strategy choice").
pub const LEADER_FAMILY_KEY: &str = "outbox";
