use async_trait::async_trait;

use crate::connection::Connection;
use crate::core::{Key, RedisValue, Result, RomError};
use crate::model::fields::{FieldContext, FieldDescriptor, FieldIo, FieldKind, FieldWrite};
use crate::model::{Model, ModelWrite};

/// A reference to another model, possibly not yet fetched.
///
/// This is a plain sum type: callers match on it or go through [`get`]
/// (which fails clearly while unresolved) rather than relying on a proxy
/// that mimics the target. A lazily loaded reference field deserializes to
/// `Unresolved` carrying only the target id; `#[rom(eager)]` fields arrive
/// `Resolved`.
///
/// [`get`]: Reference::get
#[derive(Debug, Clone)]
pub enum Reference<M: Model> {
    Unresolved(Key),
    Resolved(Box<M>),
}

impl<M: Model> Reference<M> {
    /// Reference a model by id without fetching it.
    pub fn new(id: impl Into<Key>) -> Self {
        Self::Unresolved(id.into())
    }

    /// Wrap an already materialized model.
    pub fn resolved(model: M) -> Self {
        Self::Resolved(Box::new(model))
    }

    /// Id of the referenced model.
    pub fn id(&self) -> &Key {
        match self {
            Self::Unresolved(id) => id,
            Self::Resolved(model) => model.id(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The materialized target, or a not-resolved error.
    pub fn get(&self) -> Result<&M> {
        match self {
            Self::Resolved(model) => Ok(model),
            Self::Unresolved(id) => Err(RomError::NotResolved {
                model: M::model_name(),
                id: id.clone(),
            }),
        }
    }

    pub fn get_mut(&mut self) -> Result<&mut M> {
        match self {
            Self::Resolved(model) => Ok(model),
            Self::Unresolved(id) => Err(RomError::NotResolved {
                model: M::model_name(),
                id: id.clone(),
            }),
        }
    }

    /// The materialized target, if any.
    pub fn into_inner(self) -> Option<M> {
        match self {
            Self::Resolved(model) => Some(*model),
            Self::Unresolved(_) => None,
        }
    }

    /// Fetch the target if it has not been fetched yet.
    pub async fn resolve(&mut self, cx: &Connection) -> Result<&M> {
        if let Self::Unresolved(id) = self {
            let model = M::get(cx, id.clone()).await?;
            *self = Self::Resolved(Box::new(model));
        }
        self.get()
    }

    /// Re-fetch the target unconditionally.
    pub async fn refresh(&mut self, cx: &Connection) -> Result<&M> {
        let model = M::get(cx, self.id().clone()).await?;
        *self = Self::Resolved(Box::new(model));
        self.get()
    }
}

impl<M: Model> From<M> for Reference<M> {
    fn from(model: M) -> Self {
        Self::resolved(model)
    }
}

impl<M: Model + PartialEq> PartialEq for Reference<M> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Resolved(a), Self::Resolved(b)) => a == b,
            _ => self.id() == other.id(),
        }
    }
}

#[async_trait]
impl<M: Model> FieldIo for Reference<M> {
    const KIND: FieldKind = FieldKind::Reference;

    fn write(&self, _field: &FieldDescriptor) -> Result<FieldWrite> {
        match self {
            Self::Unresolved(id) => {
                if id.is_empty() {
                    return Err(RomError::MissingId {
                        model: M::model_name(),
                    });
                }
                Ok(FieldWrite::Reference {
                    id: id.clone(),
                    nested: None,
                })
            }
            Self::Resolved(model) => {
                if model.id().is_empty() {
                    return Err(RomError::MissingId {
                        model: M::model_name(),
                    });
                }
                Ok(FieldWrite::Reference {
                    id: model.id().clone(),
                    nested: Some(Box::new(ModelWrite((**model).clone()))),
                })
            }
        }
    }

    async fn read(ctx: &FieldContext<'_>, raw: Option<&RedisValue>) -> Result<Self> {
        match raw {
            Some(id) => {
                let id = Key::new(id.clone());
                if ctx.field.eager() {
                    let model = M::get(ctx.cx, id).await?;
                    Ok(Self::resolved(model))
                } else {
                    Ok(Self::Unresolved(id))
                }
            }
            None => Err(RomError::MissingField {
                model: ctx.model,
                field: ctx.field.name,
            }),
        }
    }
}
