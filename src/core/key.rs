use std::fmt;

use uuid::Uuid;

/// Opaque storage key.
///
/// A `Key` is either a model id (`"1"`, `"f3a9…"`) or a derived storage key
/// (`"bar:1"`, `"bar:1:tags"`). Derivation is string concatenation with `:`
/// so that keys written by this crate stay bit-compatible with data written
/// by other clients of the same layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Primary key of a model: `{prefix}:{id}`.
    pub fn namespaced(prefix: &str, id: &Key) -> Self {
        Self(format!("{}:{}", prefix, id.0))
    }

    /// Nested key under this one: `{self}:{segment}`.
    pub fn join(&self, segment: &str) -> Self {
        Self(format!("{}:{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for Key {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self(value.to_string())
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<Uuid> for Key {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for Key {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Key {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
