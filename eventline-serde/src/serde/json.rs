use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::serde::{Deserializer, Error, Serializer};

/// JSON codec for event and command payloads.
#[derive(Debug, Clone, Copy)]
pub struct Json<T>(PhantomData<T>);

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T> Serializer<T> for Json<T>
where
    T: Serialize,
{
    fn serialize(&self, value: &T) -> Vec<u8> {
        serde_json::to_vec(value).expect("json serialization should not fail")
    }
}

impl<T> Deserializer<T> for Json<T>
where
    T: DeserializeOwned,
{
    fn deserialize(&self, data: &[u8]) -> Result<T, Error> {
        serde_json::from_slice(data).map_err(|e| Error::Deserialization(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct Person {
        name: String,
        age: u32,
    }

    #[test]
    fn it_round_trips_through_json() {
        let codec = Json::<Person>::default();
        let person = Person {
            name: "Ada".into(),
            age: 30,
        };

        let bytes = codec.serialize(&person);
        let decoded = codec.deserialize(&bytes).unwrap();

        assert_eq!(person, decoded);
    }
}
