use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::try_join_all;

use super::codec::{ElementCodec, ScalarElement};
use crate::connection::Connection;
use crate::core::{Key, RedisValue, Result, RomError};
use crate::model::fields::{
    FieldContext, FieldDescriptor, FieldIo, FieldKind, FieldWrite, NestedCollectionWrite,
};
use crate::model::SaveOptions;
use crate::store::Transaction;

/// A remote list with a local, order-preserving member cache.
///
/// Entries mirror the remote list's physical order on load, local mutation
/// order on save, and appends go to the tail. As with [`crate::RedisSet`],
/// model elements may sit in the cache as "known, not yet fetched" until
/// [`RedisList::load`] materializes them; indexing an unresolved entry is a
/// distinct not-loaded error, not a missing-item error.
pub struct RedisList<T, C = ScalarElement> {
    id: Option<Key>,
    key: Option<Key>,
    entries: Vec<(RedisValue, Option<T>)>,
    _codec: PhantomData<C>,
}

impl<T, C: ElementCodec<T>> RedisList<T, C> {
    /// Key namespace tag for standalone lists.
    pub const KIND_TAG: &'static str = "redislist";

    pub fn new() -> Self {
        Self {
            id: None,
            key: None,
            entries: Vec::new(),
            _codec: PhantomData,
        }
    }

    /// Standalone list rooted at `redislist:{id}`.
    pub fn with_id(id: impl Into<Key>) -> Self {
        let id = id.into();
        let key = Key::namespaced(Self::KIND_TAG, &id);
        Self {
            id: Some(id),
            key: Some(key),
            entries: Vec::new(),
            _codec: PhantomData,
        }
    }

    pub(crate) fn bound(key: Key) -> Self {
        Self {
            id: None,
            key: Some(key),
            entries: Vec::new(),
            _codec: PhantomData,
        }
    }

    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Result<Self> {
        let mut list = Self::new();
        for value in values {
            list.push(value)?;
        }
        Ok(list)
    }

    pub fn db_key(&self) -> Result<&Key> {
        self.key.as_ref().ok_or(RomError::MissingId {
            model: Self::KIND_TAG,
        })
    }

    fn loaded_error(&self) -> RomError {
        RomError::NotLoaded {
            key: self
                .key
                .clone()
                .unwrap_or_else(|| Key::new(Self::KIND_TAG)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.iter().all(|(_, value)| value.is_some())
    }

    /// The element at `index`.
    ///
    /// Out-of-range is an index error; in-range but unresolved is a
    /// not-loaded error, so callers can tell "absent" from "needs a fetch".
    pub fn get(&self, index: usize) -> Result<&T> {
        let len = self.entries.len();
        let (_, value) = self
            .entries
            .get(index)
            .ok_or(RomError::IndexOutOfBounds { index, len })?;
        value.as_ref().ok_or_else(|| self.loaded_error())
    }

    pub fn contains(&self, value: &T) -> Result<bool> {
        let raw = C::encode(value)?;
        Ok(self.entries.iter().any(|(stored, _)| *stored == raw))
    }

    /// Append to the in-memory list only.
    pub fn push(&mut self, value: T) -> Result<()> {
        let raw = C::encode(&value)?;
        self.entries.push((raw, Some(value)));
        Ok(())
    }

    /// Insert into the in-memory list only.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.entries.len();
        if index > len {
            return Err(RomError::IndexOutOfBounds { index, len });
        }
        let raw = C::encode(&value)?;
        self.entries.insert(index, (raw, Some(value)));
        Ok(())
    }

    /// Remove from the in-memory list only; returns the removed element if
    /// it had been materialized.
    pub fn remove(&mut self, index: usize) -> Result<Option<T>> {
        let len = self.entries.len();
        if index >= len {
            return Err(RomError::IndexOutOfBounds { index, len });
        }
        Ok(self.entries.remove(index).1)
    }

    /// Materialized members in list order, or a not-loaded error.
    pub fn members(&self) -> Result<Vec<&T>> {
        self.entries
            .iter()
            .map(|(_, value)| value.as_ref().ok_or_else(|| self.loaded_error()))
            .collect()
    }

    /// Wire forms in list order.
    pub fn raw_members(&self) -> impl Iterator<Item = &RedisValue> {
        self.entries.iter().map(|(raw, _)| raw)
    }

    /// Re-fetch the remote list and materialize every member.
    ///
    /// Model members resolve concurrently, but the materialized cache keeps
    /// the remote order.
    pub async fn load(&mut self, cx: &Connection) -> Result<()> {
        let key = self.db_key()?.clone();
        let raws = cx.store().lrange(&key, 0, -1).await?;
        let mut entries = Vec::with_capacity(raws.len());
        for raw in raws {
            let local = C::decode_local(&raw)?;
            entries.push((raw, local));
        }
        self.entries = entries;
        self.resolve_members(cx).await
    }

    async fn resolve_members(&mut self, cx: &Connection) -> Result<()> {
        let pending: Vec<(usize, RedisValue)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (_, value))| value.is_none())
            .map(|(index, (raw, _))| (index, raw.clone()))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        let resolved =
            try_join_all(pending.iter().map(|(_, raw)| C::resolve(cx, raw))).await?;
        for ((index, _), value) in pending.into_iter().zip(resolved) {
            self.entries[index].1 = Some(value);
        }
        Ok(())
    }

    /// Push to the remote tail and the local tail in one call.
    pub async fn async_append(
        &mut self,
        cx: &Connection,
        value: T,
        options: SaveOptions,
    ) -> Result<()> {
        let key = self.db_key()?.clone();
        let raw = C::encode(&value)?;
        cx.store().rpush(&key, vec![raw.clone()]).await?;
        if options.cascade {
            C::save_value(cx, &value, SaveOptions::new().with_optimistic(options.optimistic))
                .await?;
        }
        self.entries.push((raw, Some(value)));
        Ok(())
    }

    /// Persist the list standalone under its own key.
    pub async fn save(&self, cx: &Connection, options: SaveOptions) -> Result<()> {
        let key = self.db_key()?.clone();
        let mut tx = if options.optimistic {
            cx.transaction_watching(std::slice::from_ref(&key)).await?
        } else {
            cx.transaction()
        };
        self.save_into(cx, &mut tx, &key, options.cascade).await?;
        if let Some(id) = &self.id {
            tx.sadd(Key::new(Self::KIND_TAG), vec![id.to_string()]);
        }
        tx.execute(cx).await
    }

    /// Queue a delete-then-rewrite of this list at `key`, preserving local
    /// order.
    pub async fn save_into(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        key: &Key,
        cascade: bool,
    ) -> Result<()> {
        tx.del(vec![key.clone()]);
        tx.rpush(key.clone(), self.raw_members().cloned().collect());
        if cascade {
            for (_, value) in &self.entries {
                if let Some(value) = value {
                    C::save_element(cx, tx, value).await?;
                }
            }
        }
        Ok(())
    }

    /// Fetch a standalone list by id (root key `redislist:{id}`), lazily.
    pub async fn fetch(cx: &Connection, id: impl Into<Key>) -> Result<Self> {
        let id = id.into();
        let key = Key::namespaced(Self::KIND_TAG, &id);
        let mut list = Self::from_key(cx, key, false).await?;
        list.id = Some(id);
        Ok(list)
    }

    /// Fetch the list stored at `key`, preserving remote order.
    pub async fn from_key(cx: &Connection, key: Key, eager: bool) -> Result<Self> {
        if !cx.store().exists(&key).await? {
            return Err(RomError::CollectionNotFound { key });
        }
        let raws = cx.store().lrange(&key, 0, -1).await?;
        let mut entries = Vec::with_capacity(raws.len());
        for raw in raws {
            let local = C::decode_local(&raw)?;
            entries.push((raw, local));
        }
        let mut list = Self {
            id: None,
            key: Some(key),
            entries,
            _codec: PhantomData,
        };
        if eager {
            list.resolve_members(cx).await?;
        }
        Ok(list)
    }

    pub async fn delete(&self, cx: &Connection, cascade: bool) -> Result<()> {
        let key = self.db_key()?.clone();
        let mut tx = cx.transaction();
        self.delete_into(cx, &mut tx, &key, cascade).await?;
        if let Some(id) = &self.id {
            tx.srem(Key::new(Self::KIND_TAG), vec![id.to_string()]);
        }
        tx.execute(cx).await
    }

    pub async fn delete_into(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        key: &Key,
        cascade: bool,
    ) -> Result<()> {
        tx.del(vec![key.clone()]);
        if cascade {
            for (_, value) in &self.entries {
                if let Some(value) = value {
                    C::delete_element(cx, tx, value).await?;
                }
            }
        }
        Ok(())
    }

    /// Remote length.
    pub async fn count(&self, cx: &Connection) -> Result<usize> {
        cx.store().llen(self.db_key()?).await
    }

    pub async fn exists(&self, cx: &Connection) -> Result<bool> {
        cx.store().exists(self.db_key()?).await
    }
}

impl<T, C: ElementCodec<T>> Default for RedisList<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C> Clone for RedisList<T, C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            key: self.key.clone(),
            entries: self.entries.clone(),
            _codec: PhantomData,
        }
    }
}

impl<T, C> PartialEq for RedisList<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((a, _), (b, _))| a == b)
    }
}

impl<T, C> fmt::Debug for RedisList<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisList")
            .field("key", &self.key)
            .field("members", &self.entries.len())
            .field(
                "loaded",
                &self
                    .entries
                    .iter()
                    .filter(|(_, value)| value.is_some())
                    .count(),
            )
            .finish()
    }
}

#[async_trait]
impl<T, C> FieldIo for RedisList<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: ElementCodec<T>,
{
    const KIND: FieldKind = FieldKind::List(C::ELEMENT_KIND);

    fn write(&self, field: &FieldDescriptor) -> Result<FieldWrite> {
        if field.has_default() && self.entries.is_empty() {
            return Ok(FieldWrite::Skip);
        }
        Ok(FieldWrite::Collection(Box::new(self.clone())))
    }

    async fn read(ctx: &FieldContext<'_>, raw: Option<&RedisValue>) -> Result<Self> {
        match raw {
            Some(stored) => {
                let key = Key::new(stored.clone());
                match Self::from_key(ctx.cx, key.clone(), ctx.field.eager()).await {
                    Err(RomError::CollectionNotFound { .. }) if ctx.field.has_default() => {
                        Ok(Self::bound(key))
                    }
                    result => result,
                }
            }
            None if ctx.field.has_default() => Ok(Self::bound(ctx.nested_key.clone())),
            None => Err(RomError::MissingField {
                model: ctx.model,
                field: ctx.field.name,
            }),
        }
    }

    fn default_value() -> Option<Self> {
        Some(Self::new())
    }
}

#[async_trait]
impl<T, C> NestedCollectionWrite for RedisList<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: ElementCodec<T>,
{
    async fn save_at(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        key: &Key,
        cascade: bool,
    ) -> Result<()> {
        self.save_into(cx, tx, key, cascade).await
    }

    async fn delete_at(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        key: &Key,
        cascade: bool,
    ) -> Result<()> {
        self.delete_into(cx, tx, key, cascade).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_order_is_preserved() {
        let mut list = RedisList::<String>::new();
        list.push("b".to_string()).unwrap();
        list.push("c".to_string()).unwrap();
        list.insert(0, "a".to_string()).unwrap();
        let members: Vec<_> = list.members().unwrap().into_iter().cloned().collect();
        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_out_of_bounds_is_distinct_from_not_loaded() {
        let list = RedisList::<i64>::from_values([1, 2]).unwrap();
        assert!(matches!(
            list.get(5),
            Err(RomError::IndexOutOfBounds { index: 5, len: 2 })
        ));
        assert_eq!(*list.get(1).unwrap(), 2);
    }

    #[test]
    fn test_remove_returns_materialized_value() {
        let mut list = RedisList::<i64>::from_values([1, 2, 3]).unwrap();
        assert_eq!(list.remove(1).unwrap(), Some(2));
        assert_eq!(list.len(), 2);
        assert!(list.remove(9).is_err());
    }
}
