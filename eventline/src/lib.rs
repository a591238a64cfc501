#![doc = include_str!("../README.md")]

mod append;
mod command;
mod cursor;
mod error;
mod event;
mod event_store;
mod period;
mod processor;
mod projector;
mod query;
mod tag;

#[doc(inline)]
pub use crate::append::AppendOutcome;
#[doc(inline)]
pub use crate::command::{Command, CommandHandler, CommandRegistry, CommandResult};
#[doc(inline)]
pub use crate::cursor::Cursor;
#[doc(inline)]
pub use crate::error::{CommandError, DuplicateRegistration, EventStoreError};
#[doc(inline)]
pub use crate::event::{
    new_event, Event, EventTypeTooLong, NewEvent, RawEvent, MAX_EVENT_TYPE_LEN,
};
#[doc(inline)]
pub use crate::event_store::EventStore;
#[doc(inline)]
pub use crate::period::{PeriodId, PeriodType};
#[doc(inline)]
pub use crate::processor::{
    BatchHandler, LeaderElector, LockStrategy, ProcessorConfig, ProcessorStatus, Progress,
    ProgressTracker,
};
#[doc(inline)]
pub use crate::projector::{ProjectionResult, StateProjector};
#[doc(inline)]
pub use crate::query::{union_all, AppendCondition, Query, QueryItem};
#[doc(inline)]
pub use crate::tag::{Tag, TagError, TagSet};

pub type BoxDynError = Box<dyn std::error::Error + 'static + Send + Sync>;

#[cfg(feature = "macros")]
pub use eventline_macros::Event;
