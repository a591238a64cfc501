//! The view worker (spec.md §4.7): projects events into read-model tables
//! the view itself owns, subscription-keyed by view name.
mod config;
mod handler;
mod projector;

pub use config::ViewSubscriptionConfig;
pub use handler::{ViewBatchHandler, ViewFetcher};
pub use projector::ViewProjector;

use crate::manager::ProcessorManager;
use crate::progress::PgProgressTracker;

/// The management surface for views: pause/resume/reset and status/detail
/// lookups, keyed by view name.
pub type ViewManager = ProcessorManager<PgProgressTracker>;

/// The shared advisory-lock key used under `LockStrategy::Global`. Views
/// default to `LockStrategy::PerSubscription` instead (spec.md §4.7), so
/// this only matters for a deployment that opts a view family into the
/// global strategy.
pub const LEADER_FAMILY_KEY: &str = "views";
