use crate::core::Key;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RomError {
    #[error("{model} '{id}' not found")]
    NotFound { model: &'static str, id: Key },

    #[error("collection with key '{key}' not found")]
    CollectionNotFound { key: Key },

    #[error("collection '{key}' has unresolved members; call load() first")]
    NotLoaded { key: Key },

    #[error("reference to {model} '{id}' is unresolved; call resolve() first")]
    NotResolved { model: &'static str, id: Key },

    #[error("index {index} is out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("{model} requires an id before it can be persisted")]
    MissingId { model: &'static str },

    #[error("missing stored value for field '{field}' of {model}")]
    MissingField {
        model: &'static str,
        field: &'static str,
    },

    #[error("{model} has no field named '{field}'")]
    UnknownField { model: &'static str, field: String },

    #[error("cannot decode '{target}': {message}")]
    Serialization {
        target: &'static str,
        message: String,
    },

    #[error("invalid model declaration: {0}")]
    Config(String),

    #[error("transaction aborted: watched key '{key}' was modified concurrently")]
    Conflict { key: Key },

    #[error("WRONGTYPE operation against key '{key}' holding {found}, expected {expected}")]
    WrongType {
        key: Key,
        expected: &'static str,
        found: &'static str,
    },

    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, RomError>;

impl RomError {
    /// Builds a decode error tagged with the target Rust type.
    pub fn serialization<T>(message: impl Into<String>) -> Self {
        Self::Serialization {
            target: std::any::type_name::<T>(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn unknown_field(model: &'static str, field: impl Into<String>) -> Self {
        Self::UnknownField {
            model,
            field: field.into(),
        }
    }

    /// True for any not-found flavor, regardless of the model type.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::CollectionNotFound { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_loaded(&self) -> bool {
        matches!(self, Self::NotLoaded { .. } | Self::NotResolved { .. })
    }
}
