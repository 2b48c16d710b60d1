use serde::{Deserialize, Serialize};
use std::fmt;

/// Builds a [`QueryKey`] from a list of primitive values.
///
/// ```
/// use query_boundary::query_key;
///
/// let key = query_key!["todos", 3, true];
/// assert_eq!(key.to_string(), r#"["todos",3,true]"#);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($part:expr),* $(,)?) => {
        $crate::query::QueryKey::new(::std::vec![$($crate::query::KeyPart::from($part)),*])
    };
}

/// A single primitive segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    /// Boolean segment.
    Bool(bool),
    /// Integer segment.
    Int(i64),
    /// String segment.
    Str(String),
}

impl KeyPart {
    /// Returns the integer value, if this part is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyPart::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string value, if this part is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

macro_rules! impl_int_part {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyPart {
                fn from(value: $ty) -> Self {
                    KeyPart::Int(value as i64)
                }
            }
        )*
    };
}

impl_int_part!(i8, i16, i32, i64, u8, u16, u32);

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bool(value) => write!(f, "{value}"),
            KeyPart::Int(value) => write!(f, "{value}"),
            KeyPart::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Identifies a query in the cache.
///
/// An ordered sequence of primitive values. Every input a producer depends on
/// must be part of its key, so that changing an input yields a new key.
/// Producers receive the key and read their inputs back out of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    /// Creates a key from its parts.
    pub fn new(parts: Vec<KeyPart>) -> Self {
        QueryKey(parts)
    }

    /// Returns a new key with `part` appended.
    pub fn with(&self, part: impl Into<KeyPart>) -> Self {
        let mut parts = self.0.clone();
        parts.push(part.into());
        QueryKey(parts)
    }

    /// The parts of the key, in order.
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// The part at `index`, if present.
    pub fn part(&self, index: usize) -> Option<&KeyPart> {
        self.0.get(index)
    }

    /// Reads the integer at `index`, failing with [`QueryError::InvalidKey`](super::QueryError::InvalidKey).
    pub fn int_at(&self, index: usize) -> Result<i64, super::QueryError> {
        self.part(index)
            .and_then(KeyPart::as_int)
            .ok_or_else(|| super::QueryError::InvalidKey {
                key: self.to_string(),
                index,
            })
    }

    /// Reads the string at `index`, failing with [`QueryError::InvalidKey`](super::QueryError::InvalidKey).
    pub fn str_at(&self, index: usize) -> Result<&str, super::QueryError> {
        self.part(index)
            .and_then(KeyPart::as_str)
            .ok_or_else(|| super::QueryError::InvalidKey {
                key: self.to_string(),
                index,
            })
    }

    /// Whether `prefix` matches the start of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, part) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryError;
    use leptos::Serializable;

    #[test]
    fn macro_builds_parts_in_order() {
        let key = query_key!["page", 2, false];
        assert_eq!(
            key.parts(),
            &[
                KeyPart::Str("page".into()),
                KeyPart::Int(2),
                KeyPart::Bool(false)
            ]
        );
    }

    #[test]
    fn changing_an_input_changes_the_key() {
        let base = query_key!["number"];
        assert_ne!(base.with(1), base.with(2));
        assert_eq!(base.with(1), query_key!["number", 1]);
        assert!(base.with(1).starts_with(&base));
    }

    #[test]
    fn typed_accessors() {
        let key = query_key!["number", 7];
        assert_eq!(key.str_at(0), Ok("number"));
        assert_eq!(key.int_at(1), Ok(7));
        assert_eq!(
            key.int_at(0),
            Err(QueryError::InvalidKey {
                key: r#"["number",7]"#.to_string(),
                index: 0
            })
        );
        assert!(key.int_at(5).is_err());
    }

    #[test]
    fn serializes_as_plain_array() {
        let key = query_key!["items", 10, true];
        let encoded = key.ser().expect("serialize key");
        assert_eq!(encoded, r#"["items",10,true]"#);
        let decoded = QueryKey::de(&encoded).expect("deserialize key");
        assert_eq!(decoded, key);
    }
}
