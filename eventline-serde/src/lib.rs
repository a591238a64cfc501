//! Serialization and deserialization for event and command payloads.
//!
//! The event store treats payloads as opaque bytes; this crate supplies the
//! `Serde` trait the store needs to move between that byte representation and
//! the typed values application code works with. Only a JSON implementation
//! is provided — the event payload format is fixed to JSON UTF-8 documents.
pub mod serde;

pub use crate::serde::{Deserializer, Error, Serde, Serializer};
