#[cfg(feature = "json")]
pub mod json;

/// Serialization and deserialization error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error occurred while deserializing the stored bytes.
    #[error("deserialization error: {0}")]
    Deserialization(#[source] Box<dyn std::error::Error + Sync + Send>),
}

/// Serializes a value of type `T` into bytes suitable for storage.
pub trait Serializer<T> {
    fn serialize(&self, value: &T) -> Vec<u8>;
}

/// Deserializes stored bytes back into a value of type `T`.
pub trait Deserializer<T> {
    fn deserialize(&self, data: &[u8]) -> Result<T, Error>;
}

/// Combines `Serializer` and `Deserializer` for convenience.
pub trait Serde<T>: Serializer<T> + Deserializer<T> {}

impl<K, T> Serde<T> for K where K: Serializer<T> + Deserializer<T> {}
