pub mod memory;
pub mod transaction;

pub use memory::MemoryStore;
pub use transaction::{CommandBatch, StoreCommand, Transaction};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::{Key, RedisValue, Result};

/// The backing-store primitive contract.
///
/// Everything the mapper needs from the store: key lifecycle, hash-map,
/// set and list operations, plus watch/execute for optimistic-lock
/// transactions. The network transport behind these primitives is out of
/// scope for this crate; [`MemoryStore`] is the bundled reference backend.
///
/// Watch semantics: [`Store::watch`] returns a per-key version counter.
/// [`Store::execute`] must apply the whole batch atomically, or apply
/// nothing and fail with [`crate::RomError::Conflict`] if any watched key's
/// version moved since the watch was taken.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn exists(&self, key: &Key) -> Result<bool>;

    /// Keys matching a glob pattern (`*` and `?` wildcards).
    async fn keys(&self, pattern: &str) -> Result<Vec<Key>>;

    async fn del(&self, keys: &[Key]) -> Result<usize>;

    async fn hgetall(&self, key: &Key) -> Result<HashMap<String, RedisValue>>;

    async fn hget(&self, key: &Key, field: &str) -> Result<Option<RedisValue>>;

    async fn hset(&self, key: &Key, fields: Vec<(String, RedisValue)>) -> Result<()>;

    async fn hdel(&self, key: &Key, fields: &[String]) -> Result<usize>;

    async fn sadd(&self, key: &Key, members: Vec<RedisValue>) -> Result<usize>;

    async fn srem(&self, key: &Key, members: Vec<RedisValue>) -> Result<usize>;

    async fn smembers(&self, key: &Key) -> Result<Vec<RedisValue>>;

    async fn scard(&self, key: &Key) -> Result<usize>;

    /// Incremental set scan. Pass cursor `0` to start; a returned cursor of
    /// `0` means the scan is complete.
    async fn sscan(&self, key: &Key, cursor: u64) -> Result<(u64, Vec<RedisValue>)>;

    async fn rpush(&self, key: &Key, values: Vec<RedisValue>) -> Result<usize>;

    /// Inclusive range; negative indices count from the tail.
    async fn lrange(&self, key: &Key, start: i64, stop: i64) -> Result<Vec<RedisValue>>;

    async fn lindex(&self, key: &Key, index: i64) -> Result<Option<RedisValue>>;

    async fn llen(&self, key: &Key) -> Result<usize>;

    /// Records the current version of each key for later conflict detection.
    async fn watch(&self, keys: &[Key]) -> Result<Vec<u64>>;

    /// Applies a queued batch atomically, honoring its watches.
    async fn execute(&self, batch: CommandBatch) -> Result<()>;
}
