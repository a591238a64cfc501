//! Events and their identity: a short type name, a set of tags, and an
//! opaque JSON payload.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tag::TagSet;

/// Maximum byte length of an event type name (spec §6).
pub const MAX_EVENT_TYPE_LEN: usize = 64;

/// Error returned when an event type name violates the length limit.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("event type {0:?} exceeds the {MAX_EVENT_TYPE_LEN}-character limit")]
pub struct EventTypeTooLong(String);

/// Validates an event type name against the length limit.
pub fn validate_event_type(name: &str) -> Result<(), EventTypeTooLong> {
    if name.len() > MAX_EVENT_TYPE_LEN {
        return Err(EventTypeTooLong(name.to_string()));
    }
    Ok(())
}

/// Implemented by every event variant in an application's domain.
///
/// An `Event` knows its own short type name and the tags it should be
/// indexed under. It carries no opinion about serialization: the event
/// store serializes the whole value (via `serde`) into the opaque JSON
/// payload column, independently of `event_type`/`tags`.
pub trait Event: fmt::Debug {
    /// The event's type name, used for filtering and stored alongside the
    /// payload. Must be at most `MAX_EVENT_TYPE_LEN` characters.
    fn event_type(&self) -> &'static str;

    /// The tags this event should be indexed under.
    fn tags(&self) -> TagSet;
}

/// An event about to be appended: already serialized to its stored shape.
///
/// Built from a typed `Event` value via [`new_event`]; the event store only
/// ever deals in `NewEvent`s, never in concrete Rust event types, which
/// keeps it decoupled from any one application's event enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub event_type: String,
    pub tags: TagSet,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl NewEvent {
    pub fn new(
        event_type: impl Into<String>,
        tags: TagSet,
        payload: serde_json::Value,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, EventTypeTooLong> {
        let event_type = event_type.into();
        validate_event_type(&event_type)?;
        Ok(Self {
            event_type,
            tags,
            payload,
            occurred_at,
        })
    }
}

/// Builds a [`NewEvent`] from a typed event value, serializing its payload
/// with `serde_json` and reading its type/tags from the `Event` impl.
pub fn new_event<E>(event: &E, occurred_at: DateTime<Utc>) -> Result<NewEvent, EventTypeTooLong>
where
    E: Event + Serialize,
{
    NewEvent::new(
        event.event_type(),
        event.tags(),
        serde_json::to_value(event).expect("event payload serialization should not fail"),
        occurred_at,
    )
}

/// An event as read back from the store: the immutable envelope plus the
/// position/transaction_id assigned at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub position: i64,
    pub transaction_id: i64,
    pub event_type: String,
    pub tags: TagSet,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl RawEvent {
    /// Deserializes the opaque payload into a concrete event type.
    pub fn deserialize<E: for<'de> Deserialize<'de>>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|t| t.key() == key && t.value() == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rejects_type_names_over_the_limit() {
        let long = "x".repeat(65);
        assert!(validate_event_type(&long).is_err());
        assert!(validate_event_type(&"x".repeat(64)).is_ok());
    }
}
