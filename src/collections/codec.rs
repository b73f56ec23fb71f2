use async_trait::async_trait;

use crate::connection::Connection;
use crate::core::{Key, RedisValue, Result, RomError};
use crate::model::fields::ElementKind;
use crate::model::{Model, SaveOptions, ScalarValue};
use crate::store::Transaction;

/// Element strategy for the generic collection types.
///
/// One collection type per shape (set/list), parameterized over how its
/// elements move to and from the wire: [`ScalarElement`] encodes values
/// inline, [`ModelElement`] encodes the element's id and knows how to
/// fetch, save and delete the model behind it.
#[async_trait]
pub trait ElementCodec<T>: Send + Sync + 'static {
    const ELEMENT_KIND: ElementKind;

    fn encode(value: &T) -> Result<RedisValue>;

    /// Decode without touching the store.
    ///
    /// `Ok(None)` means the element needs a fetch ([`ElementCodec::resolve`])
    /// before it can be materialized; scalar codecs always decode locally.
    fn decode_local(raw: &RedisValue) -> Result<Option<T>>;

    /// Fetch and materialize one element.
    async fn resolve(cx: &Connection, raw: &RedisValue) -> Result<T>;

    /// Save the element standalone, in its own transaction.
    async fn save_value(cx: &Connection, value: &T, options: SaveOptions) -> Result<()>;

    /// Queue the element's save into an open transaction.
    async fn save_element(cx: &Connection, tx: &mut Transaction, value: &T) -> Result<()>;

    /// Delete the element standalone, in its own transaction.
    async fn delete_value(cx: &Connection, value: &T) -> Result<()>;

    /// Queue the element's deletion into an open transaction.
    async fn delete_element(cx: &Connection, tx: &mut Transaction, value: &T) -> Result<()>;
}

/// Elements are plain scalars; persistence of members is a no-op.
pub struct ScalarElement;

/// Elements are models, stored by id and persisted through cascade.
pub struct ModelElement;

#[async_trait]
impl<T: ScalarValue> ElementCodec<T> for ScalarElement {
    const ELEMENT_KIND: ElementKind = ElementKind::Scalar;

    fn encode(value: &T) -> Result<RedisValue> {
        value.encode()
    }

    fn decode_local(raw: &RedisValue) -> Result<Option<T>> {
        T::decode(raw).map(Some)
    }

    async fn resolve(_cx: &Connection, raw: &RedisValue) -> Result<T> {
        T::decode(raw)
    }

    async fn save_value(_cx: &Connection, _value: &T, _options: SaveOptions) -> Result<()> {
        Ok(())
    }

    async fn save_element(_cx: &Connection, _tx: &mut Transaction, _value: &T) -> Result<()> {
        Ok(())
    }

    async fn delete_value(_cx: &Connection, _value: &T) -> Result<()> {
        Ok(())
    }

    async fn delete_element(_cx: &Connection, _tx: &mut Transaction, _value: &T) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<M: Model> ElementCodec<M> for ModelElement {
    const ELEMENT_KIND: ElementKind = ElementKind::Model;

    fn encode(value: &M) -> Result<RedisValue> {
        if value.id().is_empty() {
            return Err(RomError::MissingId {
                model: M::model_name(),
            });
        }
        Ok(value.id().to_string())
    }

    fn decode_local(_raw: &RedisValue) -> Result<Option<M>> {
        Ok(None)
    }

    async fn resolve(cx: &Connection, raw: &RedisValue) -> Result<M> {
        M::get(cx, Key::new(raw.clone())).await
    }

    async fn save_value(cx: &Connection, value: &M, options: SaveOptions) -> Result<()> {
        value.save(cx, options).await
    }

    async fn save_element(cx: &Connection, tx: &mut Transaction, value: &M) -> Result<()> {
        value.save_in(cx, tx, SaveOptions::new()).await
    }

    async fn delete_value(cx: &Connection, value: &M) -> Result<()> {
        value.delete(cx, false).await
    }

    async fn delete_element(cx: &Connection, tx: &mut Transaction, value: &M) -> Result<()> {
        value.delete_in(cx, tx, false).await
    }
}
