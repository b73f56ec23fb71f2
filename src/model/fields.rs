use async_trait::async_trait;

use crate::connection::Connection;
use crate::core::{Key, RedisValue, Result};
use crate::store::Transaction;

/// What a collection field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Scalar,
    Model,
}

/// The closed set of field shapes a model can declare.
///
/// Resolved once per model type when its schema is built; the persistence
/// engine matches on the tag instead of inspecting value types at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Inline scalar stored directly in the model's hash.
    Primitive,
    /// Reference to another model, stored as the target's id.
    Reference,
    /// Set stored under a nested sub-key.
    Set(ElementKind),
    /// List stored under a nested sub-key.
    List(ElementKind),
}

impl FieldKind {
    /// True when saving or deleting this field can reach other models.
    pub const fn references_models(&self) -> bool {
        matches!(
            self,
            Self::Reference | Self::Set(ElementKind::Model) | Self::List(ElementKind::Model)
        )
    }

    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Set(_) | Self::List(_))
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Primitive => "primitive",
            Self::Reference => "reference",
            Self::Set(ElementKind::Scalar) => "set",
            Self::Set(ElementKind::Model) => "model set",
            Self::List(ElementKind::Scalar) => "list",
            Self::List(ElementKind::Model) => "model list",
        };
        f.write_str(name)
    }
}

/// Per-field behavior flags, set in `redis_model!` with `#[rom(...)]`.
///
/// Built with `const` chaining so the macro can expand an attribute list
/// like `#[rom(cascade, eager)]` into `FieldOptions::new().cascade().eager()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOptions {
    transient: bool,
    cascade: bool,
    eager: bool,
    default: bool,
}

impl FieldOptions {
    pub const fn new() -> Self {
        Self {
            transient: false,
            cascade: false,
            eager: false,
            default: false,
        }
    }

    /// Exclude the field from persistence entirely.
    pub const fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Persist referenced models / collection members on parent save.
    pub const fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    /// Materialize referenced models / collection members on load.
    pub const fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// Omit the field when its value equals `Default::default()` and
    /// synthesize the default when the stored value is missing.
    pub const fn default(mut self) -> Self {
        self.default = true;
        self
    }

    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    pub const fn is_cascade(&self) -> bool {
        self.cascade
    }

    pub const fn is_eager(&self) -> bool {
        self.eager
    }

    pub const fn has_default(&self) -> bool {
        self.default
    }
}

/// Resolved descriptor of one declared model attribute.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub optional: bool,
    options: FieldOptions,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, kind: FieldKind, optional: bool, options: FieldOptions) -> Self {
        Self {
            name,
            kind,
            optional,
            options,
        }
    }

    pub fn transient(&self) -> bool {
        self.options.is_transient()
    }

    pub fn cascade(&self) -> bool {
        self.options.is_cascade()
    }

    pub fn eager(&self) -> bool {
        self.options.is_eager()
    }

    pub fn has_default(&self) -> bool {
        self.options.has_default()
    }
}

/// Everything a field deserializer may need.
pub struct FieldContext<'a> {
    pub cx: &'a Connection,
    /// Lowercased name of the model being loaded, for error messages.
    pub model: &'static str,
    pub field: &'a FieldDescriptor,
    /// The `{prefix}:{id}:{field}` sub-key this field would nest under.
    pub nested_key: Key,
}

/// The serialized form of one field value.
pub enum FieldWrite {
    /// Nothing to store; on update the field is deleted from the hash.
    Skip,
    /// Inline scalar.
    Value(RedisValue),
    /// Referenced model: the hash stores `id`; `nested` carries the
    /// materialized target (if any) so cascade saves can reach it.
    Reference {
        id: Key,
        nested: Option<Box<dyn NestedModelWrite>>,
    },
    /// Nested collection: the hash stores the sub-key, the collection body
    /// is persisted under it as part of the same transaction.
    Collection(Box<dyn NestedCollectionWrite>),
}

/// Object-safe handle on a referenced model, used by the engine to cascade
/// saves and deletes without knowing the concrete model type.
#[async_trait]
pub trait NestedModelWrite: Send + Sync {
    async fn save_nested(&self, cx: &Connection, tx: &mut Transaction) -> Result<()>;
    async fn delete_nested(&self, cx: &Connection, tx: &mut Transaction, cascade: bool)
    -> Result<()>;
}

/// Object-safe handle on a collection value pending persistence at a key
/// chosen by its parent.
#[async_trait]
pub trait NestedCollectionWrite: Send + Sync {
    async fn save_at(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        key: &Key,
        cascade: bool,
    ) -> Result<()>;

    async fn delete_at(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        key: &Key,
        cascade: bool,
    ) -> Result<()>;
}

/// Per-type field serialization and deserialization.
///
/// Implemented for scalars (via [`crate::scalar_field!`]), `Option<T>`,
/// [`crate::Reference`], and the collection types. The associated constants
/// feed the schema registry, so a field's kind is fixed at type-resolution
/// time rather than re-derived on every operation.
#[async_trait]
pub trait FieldIo: Sized + Send + Sync + 'static {
    const KIND: FieldKind;
    const OPTIONAL: bool = false;

    /// Serialize the current value.
    fn write(&self, field: &FieldDescriptor) -> Result<FieldWrite>;

    /// Deserialize from the stored hash value (`None` when absent).
    ///
    /// Must never fetch referenced models or collection members eagerly
    /// unless `ctx.field.eager()` says so.
    async fn read(ctx: &FieldContext<'_>, raw: Option<&RedisValue>) -> Result<Self>;

    /// Value to use for a missing non-optional field that declared
    /// `#[rom(default)]`, and for transient fields on load.
    fn default_value() -> Option<Self> {
        None
    }
}

#[async_trait]
impl<T: FieldIo> FieldIo for Option<T> {
    const KIND: FieldKind = T::KIND;
    const OPTIONAL: bool = true;

    fn write(&self, field: &FieldDescriptor) -> Result<FieldWrite> {
        match self {
            None => Ok(FieldWrite::Skip),
            Some(value) => value.write(field),
        }
    }

    async fn read(ctx: &FieldContext<'_>, raw: Option<&RedisValue>) -> Result<Self> {
        match raw {
            None => Ok(None),
            Some(_) => T::read(ctx, raw).await.map(Some),
        }
    }

    fn default_value() -> Option<Self> {
        Some(None)
    }
}
