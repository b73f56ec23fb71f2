pub mod fields;
pub mod reference;
pub mod registry;
pub mod serialize;

pub use fields::{
    ElementKind, FieldContext, FieldDescriptor, FieldIo, FieldKind, FieldOptions, FieldWrite,
    NestedCollectionWrite, NestedModelWrite,
};
pub use reference::Reference;
pub use registry::{ModelSchema, SchemaBuilder};
pub use serialize::ScalarValue;

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{BoxStream, try_unfold};
use tracing::warn;

use crate::connection::Connection;
use crate::core::{Key, RedisValue, Result, RomError};
use crate::store::Transaction;

/// Per-call persistence options.
///
/// `optimistic` watches the primary key so a concurrent writer aborts the
/// whole transaction. `cascade` forces nested models to be saved even on
/// fields that did not opt in with `#[rom(cascade)]`; it applies to the
/// immediate save only and is not propagated into nested saves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub optimistic: bool,
    pub cascade: bool,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimistic() -> Self {
        Self {
            optimistic: true,
            cascade: false,
        }
    }

    pub fn cascade() -> Self {
        Self {
            optimistic: false,
            cascade: true,
        }
    }

    pub fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = optimistic;
        self
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }
}

impl RomError {
    /// True when this is the not-found error of model type `M` specifically.
    pub fn is_not_found_for<M: Model>(&self) -> bool {
        matches!(self, RomError::NotFound { model, .. } if *model == M::model_name())
    }
}

/// A uniquely keyed record persisted as a hash in the store.
///
/// Implementations are generated by [`crate::redis_model!`]; the required
/// methods describe the type (name, schema, per-field I/O) and the provided
/// methods are the persistence engine. Storage layout, for a model `Bar`
/// with id `1`:
///
/// - primary hash: `bar:1`
/// - nested field keys: `bar:1:{field}` (collections)
/// - membership set: `bar` (every live id of the type)
#[async_trait]
pub trait Model: Clone + Send + Sync + Sized + 'static {
    /// Patch type generated alongside the model, one variant per field.
    type Change: Clone + Send + Sync + 'static;

    /// Lowercased type name; doubles as the key prefix and membership set.
    fn model_name() -> &'static str;

    /// The memoized field descriptor table.
    fn schema() -> &'static ModelSchema;

    fn id(&self) -> &Key;

    /// Serialize the named field's current value.
    fn write_field(&self, name: &str) -> Result<FieldWrite>;

    /// Deserialize an instance from a stored hash row.
    async fn read_row(
        cx: &Connection,
        id: &Key,
        row: &HashMap<String, RedisValue>,
    ) -> Result<Self>;

    fn apply_change(&mut self, change: Self::Change);

    /// Name of the field a change targets.
    fn change_target(change: &Self::Change) -> &'static str;

    /// Primary storage key, `{prefix}:{id}`.
    ///
    /// Fails when the id is unset: a model without an id cannot compute its
    /// own key and no persistence operation may proceed.
    fn db_key(&self) -> Result<Key> {
        if self.id().is_empty() {
            return Err(RomError::MissingId {
                model: Self::model_name(),
            });
        }
        Ok(Key::namespaced(Self::model_name(), self.id()))
    }

    /// Fetch a model by id.
    ///
    /// All-or-exception: a missing hash raises the model's not-found error,
    /// and no partial instance is ever produced. Non-transient fields are
    /// deserialized concurrently.
    async fn get<I>(cx: &Connection, id: I) -> Result<Self>
    where
        I: Into<Key> + Send,
    {
        let id = id.into();
        let key = Key::namespaced(Self::model_name(), &id);
        let row = cx.store().hgetall(&key).await?;
        if row.is_empty() {
            return Err(RomError::NotFound {
                model: Self::model_name(),
                id,
            });
        }
        Self::read_row(cx, &id, &row).await
    }

    /// Persist the full model in one atomic transaction.
    ///
    /// The primary hash is deleted and rewritten wholesale, the id is added
    /// to the membership set, and every nested reference/collection write
    /// joins the same transaction.
    async fn save(&self, cx: &Connection, options: SaveOptions) -> Result<()> {
        let key = self.db_key()?;
        let mut tx = if options.optimistic {
            cx.transaction_watching(std::slice::from_ref(&key)).await?
        } else {
            cx.transaction()
        };
        self.save_in(cx, &mut tx, options).await?;
        tx.execute(cx).await
    }

    /// Queue this model's save into an already open transaction.
    ///
    /// This is the reentrant entry point: nested saves triggered by cascade
    /// land in the caller's transaction, so a parent save commits all of its
    /// reachable writes atomically or not at all.
    async fn save_in(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        options: SaveOptions,
    ) -> Result<()> {
        let key = self.db_key()?;
        let schema = Self::schema();
        let mut row: Vec<(String, RedisValue)> = Vec::with_capacity(schema.fields().len());

        tx.del(vec![key.clone()]);
        for field in schema.fields() {
            if field.transient() {
                continue;
            }
            match self.write_field(field.name)? {
                FieldWrite::Skip => {}
                FieldWrite::Value(value) => row.push((field.name.to_string(), value)),
                FieldWrite::Reference { id, nested } => {
                    row.push((field.name.to_string(), id.to_string()));
                    if options.cascade || field.cascade() {
                        if let Some(nested) = nested {
                            nested.save_nested(cx, tx).await?;
                        }
                    }
                }
                FieldWrite::Collection(collection) => {
                    let nested_key = key.join(field.name);
                    row.push((field.name.to_string(), nested_key.to_string()));
                    collection
                        .save_at(cx, tx, &nested_key, options.cascade || field.cascade())
                        .await?;
                }
            }
        }
        tx.hset(key, row);
        tx.sadd(Key::new(Self::model_name()), vec![self.id().to_string()]);
        Ok(())
    }

    /// Apply the given changes and persist only those fields.
    ///
    /// Untouched fields stay as stored. A change whose serialized form is
    /// empty (an optional set to `None`, or a `#[rom(default)]` field back
    /// at its default) deletes the field from the hash instead of leaving a
    /// stale value. Returns the updated instance.
    async fn update(
        &self,
        cx: &Connection,
        options: SaveOptions,
        changes: Vec<Self::Change>,
    ) -> Result<Self> {
        if changes.is_empty() {
            return Ok(self.clone());
        }
        let key = self.db_key()?;
        let schema = Self::schema();

        let mut updated = self.clone();
        let mut changed: Vec<&'static str> = Vec::new();
        for change in changes {
            let name = Self::change_target(&change);
            if !changed.contains(&name) {
                changed.push(name);
            }
            updated.apply_change(change);
        }

        let mut tx = if options.optimistic {
            cx.transaction_watching(std::slice::from_ref(&key)).await?
        } else {
            cx.transaction()
        };
        for name in changed {
            let field = schema.expect_field(name)?;
            if field.transient() {
                continue;
            }
            match updated.write_field(name)? {
                FieldWrite::Skip => tx.hdel(key.clone(), vec![name.to_string()]),
                FieldWrite::Value(value) => {
                    tx.hset(key.clone(), vec![(name.to_string(), value)]);
                }
                FieldWrite::Reference { id, nested } => {
                    tx.hset(key.clone(), vec![(name.to_string(), id.to_string())]);
                    if options.cascade || field.cascade() {
                        if let Some(nested) = nested {
                            nested.save_nested(cx, &mut tx).await?;
                        }
                    }
                }
                FieldWrite::Collection(collection) => {
                    let nested_key = key.join(name);
                    tx.hset(
                        key.clone(),
                        vec![(name.to_string(), nested_key.to_string())],
                    );
                    collection
                        .save_at(cx, &mut tx, &nested_key, options.cascade || field.cascade())
                        .await?;
                }
            }
        }
        tx.execute(cx).await?;
        Ok(updated)
    }

    /// Delete the model: primary hash, every `{key}:*` nested key, and the
    /// membership entry, atomically. With `cascade`, materialized referenced
    /// models and collection members are deleted too.
    async fn delete(&self, cx: &Connection, cascade: bool) -> Result<()> {
        let mut tx = cx.transaction();
        self.delete_in(cx, &mut tx, cascade).await?;
        tx.execute(cx).await
    }

    /// Queue this model's deletion into an already open transaction.
    async fn delete_in(&self, cx: &Connection, tx: &mut Transaction, cascade: bool) -> Result<()> {
        let key = self.db_key()?;
        let mut doomed = cx.store().keys(&format!("{}:*", key)).await?;
        doomed.push(key.clone());
        tx.del(doomed);
        tx.srem(Key::new(Self::model_name()), vec![self.id().to_string()]);

        if cascade {
            for field in Self::schema().fields() {
                if field.transient() || !field.kind.references_models() {
                    continue;
                }
                match self.write_field(field.name)? {
                    FieldWrite::Reference {
                        nested: Some(nested),
                        ..
                    } => nested.delete_nested(cx, tx, cascade).await?,
                    FieldWrite::Collection(collection) => {
                        collection
                            .delete_at(cx, tx, &key.join(field.name), cascade)
                            .await?;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Re-fetch from the store, overwriting all local fields.
    async fn refresh(&mut self, cx: &Connection) -> Result<()> {
        *self = Self::get(cx, self.id().clone()).await?;
        Ok(())
    }

    /// Whether the primary hash currently exists.
    async fn exists(&self, cx: &Connection) -> Result<bool> {
        cx.store().exists(&self.db_key()?).await
    }

    /// Number of live ids in the membership set.
    async fn count(cx: &Connection) -> Result<usize> {
        cx.store().scard(&Key::new(Self::model_name())).await
    }

    /// Fetch every member of the membership set concurrently.
    ///
    /// Orphaned membership entries (id present, hash missing) are logged
    /// and skipped; any other per-item failure aborts the call.
    async fn all(cx: &Connection) -> Result<Vec<Self>> {
        let ids = cx.store().smembers(&Key::new(Self::model_name())).await?;
        let fetches = join_all(ids.iter().map(|id| Self::get(cx, id.as_str()))).await;

        let mut items = Vec::with_capacity(fetches.len());
        for (id, fetched) in ids.iter().zip(fetches) {
            match fetched {
                Ok(item) => items.push(item),
                Err(err) if err.is_not_found_for::<Self>() => {
                    warn!(model = Self::model_name(), id = %id, "membership entry is orphaned, skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(items)
    }

    /// Stream members by scanning the membership set incrementally.
    ///
    /// Orphaned ids are logged and skipped, duplicated scan returns are
    /// de-duplicated, and store errors terminate the stream.
    fn scan(cx: &Connection) -> BoxStream<'static, Result<Self>> {
        let cx = cx.clone();
        let prefix = Key::new(Self::model_name());
        let state = (
            cx,
            prefix,
            0u64,
            VecDeque::<RedisValue>::new(),
            HashSet::<RedisValue>::new(),
            false,
        );
        Box::pin(try_unfold(
            state,
            |(cx, prefix, mut cursor, mut buffer, mut seen, mut done)| async move {
                loop {
                    if let Some(id) = buffer.pop_front() {
                        if !seen.insert(id.clone()) {
                            continue;
                        }
                        match Self::get(&cx, id.as_str()).await {
                            Ok(item) => {
                                return Ok(Some((item, (cx, prefix, cursor, buffer, seen, done))));
                            }
                            Err(err) if err.is_not_found_for::<Self>() => {
                                warn!(model = Self::model_name(), id = %id, "membership entry is orphaned, skipping");
                                continue;
                            }
                            Err(err) => return Err(err),
                        }
                    }
                    if done {
                        return Ok(None);
                    }
                    let (next, page) = cx.store().sscan(&prefix, cursor).await?;
                    cursor = next;
                    if next == 0 {
                        done = true;
                    }
                    buffer.extend(page);
                }
            },
        ))
    }

    /// Drop every key under the model prefix plus the membership set.
    async fn delete_all(cx: &Connection) -> Result<()> {
        let prefix = Key::new(Self::model_name());
        let mut doomed = cx.store().keys(&format!("{}:*", prefix)).await?;
        doomed.push(prefix);
        cx.store().del(&doomed).await?;
        Ok(())
    }
}

/// Clone of a referenced model pending a cascade write.
pub struct ModelWrite<M: Model>(pub M);

#[async_trait]
impl<M: Model> NestedModelWrite for ModelWrite<M> {
    async fn save_nested(&self, cx: &Connection, tx: &mut Transaction) -> Result<()> {
        self.0.save_in(cx, tx, SaveOptions::new()).await
    }

    async fn delete_nested(
        &self,
        cx: &Connection,
        tx: &mut Transaction,
        cascade: bool,
    ) -> Result<()> {
        self.0.delete_in(cx, tx, cascade).await
    }
}
