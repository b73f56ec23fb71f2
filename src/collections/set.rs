use std::collections::HashMap;
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

/// A remote set with a local member cache.
///
/// Members are cached by wire form; for model elements the cached value may
/// be absent ("known member, not yet fetched") until [`RedisSet::load`]
/// materializes it. `add`/`discard` mutate memory only and need a
/// subsequent [`RedisSet::save`]; the `async_*` variants mutate the store
/// and the cache in the same call. `save` is a full replace: the remote key
/// is deleted and rewritten from the current in-memory members, so local
/// removals never leave stale members behind.
pub struct RedisSet<T, C = ScalarElement> {
    id: Option<Key>,
    key: Option<Key>,
    entries: HashMap<RedisValue, Option<T>>,
    _codec: PhantomData<C>,
}

impl<T, C: ElementCodec<T>> RedisSet<T, C> {
    /// Key namespace tag for standalone sets.
    pub const KIND_TAG: &'static str = "redisset";

    /// Empty, unbound set. It acquires a key when saved through a parent
    /// model or constructed with [`RedisSet::with_id`].
    pub fn new() -> Self {
        Self {
            id: None,
            key: None,
            entries: HashMap::new(),
            _codec: PhantomData,
        }
    }

    /// Standalone set rooted at `redisset:{id}`.
    pub fn with_id(id: impl Into<Key>) -> Self {
        let id = id.into();
        let key = Key::namespaced(Self::KIND_TAG, &id);
        Self {
            id: Some(id),
            key: Some(key),
            entries: HashMap::new(),
            _codec: PhantomData,
        }
    }

    /// Empty set bound to an explicit storage key.
    pub(crate) fn bound(key: Key) -> Self {
        Self {
            id: None,
            key: Some(key),
            entries: HashMap::new(),
            _codec: PhantomData,
        }
    }

    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Result<Self> {
        let mut set = Self::new();
        for value in values {
            set.add(value)?;
        }
        Ok(set)
    }

    /// The storage key, failing when the set is unbound.
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

    /// True when every member has been materialized.
    pub fn is_loaded(&self) -> bool {
        self.entries.values().all(Option::is_some)
    }

    /// Membership test by value; works on unresolved members too since
    /// membership is decided on the wire form.
    pub fn contains(&self, value: &T) -> Result<bool> {
        Ok(self.entries.contains_key(&C::encode(value)?))
    }

    /// Add to the in-memory set only.
    pub fn add(&mut self, value: T) -> Result<()> {
        let raw = C::encode(&value)?;
        self.entries.insert(raw, Some(value));
        Ok(())
    }

    /// Remove from the in-memory set only.
    pub fn discard(&mut self, value: &T) -> Result<bool> {
        let raw = C::encode(value)?;
        Ok(self.entries.remove(&raw).is_some())
    }

    /// Materialized members, in no particular order.
    ///
    /// Fails with a not-loaded error when any member is still unresolved;
    /// call [`RedisSet::load`] first.
    pub fn members(&self) -> Result<Vec<&T>> {
        self.entries
            .values()
            .map(|value| value.as_ref().ok_or_else(|| self.loaded_error()))
            .collect()
    }

    /// Wire forms of all members.
    pub fn raw_members(&self) -> impl Iterator<Item = &RedisValue> {
        self.entries.keys()
    }

    /// Re-fetch membership from the store and materialize every member.
    ///
    /// Model members are fetched concurrently.
    pub async fn load(&mut self, cx: &Connection) -> Result<()> {
        let key = self.db_key()?.clone();
        let raws = cx.store().smembers(&key).await?;
        let mut entries = HashMap::with_capacity(raws.len());
        for raw in raws {
            let local = C::decode_local(&raw)?;
            entries.insert(raw, local);
        }
        self.entries = entries;
        self.resolve_members(cx).await
    }

    async fn resolve_members(&mut self, cx: &Connection) -> Result<()> {
        let pending: Vec<RedisValue> = self
            .entries
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(raw, _)| raw.clone())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        let resolved = try_join_all(pending.iter().map(|raw| C::resolve(cx, raw))).await?;
        for (raw, value) in pending.into_iter().zip(resolved) {
            self.entries.insert(raw, Some(value));
        }
        Ok(())
    }

    /// Add a member remotely and locally in one call.
    ///
    /// With `options.cascade` a model element is saved as well, in its own
    /// transaction, honoring `options.optimistic`.
    pub async fn async_add(
        &mut self,
        cx: &Connection,
        value: T,
        options: SaveOptions,
    ) -> Result<()> {
        let key = self.db_key()?.clone();
        let raw = C::encode(&value)?;
        cx.store().sadd(&key, vec![raw.clone()]).await?;
        if options.cascade {
            C::save_value(cx, &value, SaveOptions::new().with_optimistic(options.optimistic))
                .await?;
        }
        self.entries.insert(raw, Some(value));
        Ok(())
    }

    /// Remove a member remotely and locally in one call.
    ///
    /// With `cascade` a model element is deleted as well.
    pub async fn async_discard(&mut self, cx: &Connection, value: &T, cascade: bool) -> Result<bool> {
        let key = self.db_key()?.clone();
        let raw = C::encode(value)?;
        let removed = cx.store().srem(&key, vec![raw.clone()]).await? > 0;
        if cascade {
            C::delete_value(cx, value).await?;
        }
        self.entries.remove(&raw);
        Ok(removed)
    }

    /// Persist the set standalone: delete-then-rewrite under its own key,
    /// registering the id in the `redisset` membership set.
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

    /// Queue a delete-then-rewrite of this set at `key`.
    pub async fn save_into(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        key: &Key,
        cascade: bool,
    ) -> Result<()> {
        tx.del(vec![key.clone()]);
        tx.sadd(key.clone(), self.entries.keys().cloned().collect());
        if cascade {
            for value in self.entries.values().flatten() {
                C::save_element(cx, tx, value).await?;
            }
        }
        Ok(())
    }

    /// Fetch a standalone set by id (root key `redisset:{id}`), lazily.
    pub async fn fetch(cx: &Connection, id: impl Into<Key>) -> Result<Self> {
        let id = id.into();
        let key = Key::namespaced(Self::KIND_TAG, &id);
        let mut set = Self::from_key(cx, key, false).await?;
        set.id = Some(id);
        Ok(set)
    }

    /// Fetch the set stored at `key`.
    ///
    /// Membership is read immediately; with `eager`, model members are
    /// fetched concurrently as well. A missing key is a not-found error —
    /// field deserialization substitutes the declared default instead when
    /// one exists.
    pub async fn from_key(cx: &Connection, key: Key, eager: bool) -> Result<Self> {
        if !cx.store().exists(&key).await? {
            return Err(RomError::CollectionNotFound { key });
        }
        let raws = cx.store().smembers(&key).await?;
        let mut entries = HashMap::with_capacity(raws.len());
        for raw in raws {
            let local = C::decode_local(&raw)?;
            entries.insert(raw, local);
        }
        let mut set = Self {
            id: None,
            key: Some(key),
            entries,
            _codec: PhantomData,
        };
        if eager {
            set.resolve_members(cx).await?;
        }
        Ok(set)
    }

    /// Delete the remote set; with `cascade`, delete materialized model
    /// members too.
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
            for value in self.entries.values().flatten() {
                C::delete_element(cx, tx, value).await?;
            }
        }
        Ok(())
    }

    /// Remote cardinality.
    pub async fn count(&self, cx: &Connection) -> Result<usize> {
        cx.store().scard(self.db_key()?).await
    }

    pub async fn exists(&self, cx: &Connection) -> Result<bool> {
        cx.store().exists(self.db_key()?).await
    }
}

impl<T, C: ElementCodec<T>> Default for RedisSet<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C> Clone for RedisSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            key: self.key.clone(),
            entries: self.entries.clone(),
            _codec: PhantomData,
        }
    }
}

impl<T, C> PartialEq for RedisSet<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.keys().all(|raw| other.entries.contains_key(raw))
    }
}

impl<T, C> fmt::Debug for RedisSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSet")
            .field("key", &self.key)
            .field("members", &self.entries.len())
            .field(
                "loaded",
                &self.entries.values().filter(|value| value.is_some()).count(),
            )
            .finish()
    }
}

#[async_trait]
impl<T, C> FieldIo for RedisSet<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: ElementCodec<T>,
{
    const KIND: FieldKind = FieldKind::Set(C::ELEMENT_KIND);

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
impl<T, C> NestedCollectionWrite for RedisSet<T, C>
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
    fn test_local_add_discard() {
        let mut set = RedisSet::<String>::new();
        set.add("a".to_string()).unwrap();
        set.add("a".to_string()).unwrap();
        set.add("b".to_string()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&"a".to_string()).unwrap());
        assert!(set.discard(&"a".to_string()).unwrap());
        assert!(!set.discard(&"a".to_string()).unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_numbers_use_wire_encoding_for_membership() {
        let set = RedisSet::<i64>::from_values([1, 2, 3]).unwrap();
        assert!(set.contains(&2).unwrap());
        assert!(!set.contains(&4).unwrap());
        let mut raws: Vec<_> = set.raw_members().cloned().collect();
        raws.sort();
        assert_eq!(raws, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_unbound_set_has_no_key() {
        let set = RedisSet::<String>::new();
        assert!(set.db_key().is_err());
        let set = RedisSet::<String>::with_id("colors");
        assert_eq!(set.db_key().unwrap().as_str(), "redisset:colors");
    }
}
