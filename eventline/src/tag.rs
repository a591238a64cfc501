//! Tags are `"key=value"` strings attached to events and used to scope
//! queries without requiring a typed domain-identifier schema.
use std::collections::BTreeSet;
use std::fmt;

/// Error returned when a tag or its parts violate the format rules.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag key must not be empty")]
    EmptyKey,
    #[error("tag value must not be empty")]
    EmptyValue,
    #[error("tag must contain a '=' separating key and value, got {0:?}")]
    MissingSeparator(String),
}

/// A single `key=value` tag.
///
/// Keys and values must each be non-empty. Parsing splits on the *first*
/// `=`, so values may themselves contain `=`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Builds a tag from a key and a value, validating both are non-empty.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, TagError> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() {
            return Err(TagError::EmptyKey);
        }
        if value.is_empty() {
            return Err(TagError::EmptyValue);
        }
        Ok(Self { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl std::str::FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| TagError::MissingSeparator(s.to_string()))?;
        Tag::new(key, value)
    }
}

/// An unordered, deduplicated set of tags.
pub type TagSet = BTreeSet<Tag>;

/// Builds a `TagSet` from `(key, value)` pairs, skipping nothing and
/// panicking on an invalid pair — intended for use with literal tags known
/// at the call site.
#[macro_export]
macro_rules! tags {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut set = std::collections::BTreeSet::new();
        $(set.insert($crate::Tag::new($key, $value).expect("invalid tag"));)*
        set
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_key_value() {
        let tag: Tag = "wallet_id=W1".parse().unwrap();
        assert_eq!(tag.key(), "wallet_id");
        assert_eq!(tag.value(), "W1");
    }

    #[test]
    fn it_splits_on_first_equals_only() {
        let tag: Tag = "key=a=b".parse().unwrap();
        assert_eq!(tag.key(), "key");
        assert_eq!(tag.value(), "a=b");
    }

    #[test]
    fn it_rejects_empty_key_or_value() {
        assert_eq!(Tag::new("", "v").unwrap_err(), TagError::EmptyKey);
        assert_eq!(Tag::new("k", "").unwrap_err(), TagError::EmptyValue);
    }

    #[test]
    fn it_rejects_missing_separator() {
        assert!(matches!(
            "no-equals-sign".parse::<Tag>(),
            Err(TagError::MissingSeparator(_))
        ));
    }
}
