use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CommandBatch, Store, StoreCommand};
use crate::core::{Key, RedisValue, Result, RomError};

const SCAN_PAGE: usize = 10;

/// In-memory reference backend.
///
/// Keys hold exactly one of the three entry shapes the mapper uses (hash,
/// set, list), mixing shapes on one key fails with a WRONGTYPE error, and a
/// per-key version counter backs WATCH: every mutation bumps the touched
/// key's version, and `execute` refuses the whole batch when a watched
/// version moved. Batches are validated before anything is applied, so a
/// failed batch leaves the store untouched.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    versions: HashMap<String, u64>,
}

enum Entry {
    Hash(HashMap<String, RedisValue>),
    Set(HashSet<RedisValue>),
    List(Vec<RedisValue>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::List(_) => "list",
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Inner {
    fn touch(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn wrong_type(key: &Key, expected: &'static str, entry: &Entry) -> RomError {
        RomError::WrongType {
            key: key.clone(),
            expected,
            found: entry.kind(),
        }
    }

    fn hash(&self, key: &Key) -> Result<Option<&HashMap<String, RedisValue>>> {
        match self.entries.get(key.as_str()) {
            None => Ok(None),
            Some(Entry::Hash(map)) => Ok(Some(map)),
            Some(other) => Err(Self::wrong_type(key, "hash", other)),
        }
    }

    fn set(&self, key: &Key) -> Result<Option<&HashSet<RedisValue>>> {
        match self.entries.get(key.as_str()) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(other) => Err(Self::wrong_type(key, "set", other)),
        }
    }

    fn list(&self, key: &Key) -> Result<Option<&Vec<RedisValue>>> {
        match self.entries.get(key.as_str()) {
            None => Ok(None),
            Some(Entry::List(list)) => Ok(Some(list)),
            Some(other) => Err(Self::wrong_type(key, "list", other)),
        }
    }

    fn sorted_members(&self, key: &Key) -> Result<Vec<RedisValue>> {
        let mut members: Vec<RedisValue> = self
            .set(key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        Ok(members)
    }

    fn apply_del(&mut self, keys: &[Key]) -> usize {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key.as_str()).is_some() {
                removed += 1;
                self.touch(key.as_str());
            }
        }
        removed
    }

    fn apply_hset(&mut self, key: &Key, fields: &[(String, RedisValue)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let entry = self
            .entries
            .entry(key.as_str().to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(map) => {
                for (field, value) in fields {
                    map.insert(field.clone(), value.clone());
                }
            }
            other => return Err(Self::wrong_type(key, "hash", other)),
        }
        self.touch(key.as_str());
        Ok(())
    }

    fn apply_hdel(&mut self, key: &Key, fields: &[String]) -> Result<usize> {
        let (removed, now_empty) = match self.entries.get_mut(key.as_str()) {
            None => return Ok(0),
            Some(Entry::Hash(map)) => {
                let mut removed = 0;
                for field in fields {
                    if map.remove(field).is_some() {
                        removed += 1;
                    }
                }
                (removed, map.is_empty())
            }
            Some(other) => return Err(Self::wrong_type(key, "hash", other)),
        };
        if now_empty {
            self.entries.remove(key.as_str());
        }
        if removed > 0 {
            self.touch(key.as_str());
        }
        Ok(removed)
    }

    fn apply_sadd(&mut self, key: &Key, members: &[RedisValue]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let entry = self
            .entries
            .entry(key.as_str().to_string())
            .or_insert_with(|| Entry::Set(HashSet::new()));
        let added = match entry {
            Entry::Set(set) => members
                .iter()
                .filter(|member| set.insert((*member).clone()))
                .count(),
            other => return Err(Self::wrong_type(key, "set", other)),
        };
        self.touch(key.as_str());
        Ok(added)
    }

    fn apply_srem(&mut self, key: &Key, members: &[RedisValue]) -> Result<usize> {
        let (removed, now_empty) = match self.entries.get_mut(key.as_str()) {
            None => return Ok(0),
            Some(Entry::Set(set)) => {
                let removed = members.iter().filter(|member| set.remove(*member)).count();
                (removed, set.is_empty())
            }
            Some(other) => return Err(Self::wrong_type(key, "set", other)),
        };
        if now_empty {
            self.entries.remove(key.as_str());
        }
        if removed > 0 {
            self.touch(key.as_str());
        }
        Ok(removed)
    }

    fn apply_rpush(&mut self, key: &Key, values: &[RedisValue]) -> Result<usize> {
        if values.is_empty() {
            return Ok(self.list(key)?.map(Vec::len).unwrap_or(0));
        }
        let entry = self
            .entries
            .entry(key.as_str().to_string())
            .or_insert_with(|| Entry::List(Vec::new()));
        let len = match entry {
            Entry::List(list) => {
                list.extend(values.iter().cloned());
                list.len()
            }
            other => return Err(Self::wrong_type(key, "list", other)),
        };
        self.touch(key.as_str());
        Ok(len)
    }

    /// Dry-runs a batch against the current entry shapes.
    ///
    /// Tracks the shape each key would have after every command so that
    /// e.g. `DEL k` followed by `RPUSH k` validates even when `k` currently
    /// holds a hash.
    fn validate_batch(&self, commands: &[StoreCommand]) -> Result<()> {
        let mut shapes: HashMap<&str, Option<&'static str>> = HashMap::new();
        let current = |inner: &Self, key: &Key| inner.entries.get(key.as_str()).map(Entry::kind);

        for command in commands {
            match command {
                StoreCommand::Del { keys } => {
                    for key in keys {
                        shapes.insert(key.as_str(), None);
                    }
                }
                StoreCommand::HSet { key, .. } | StoreCommand::HDel { key, .. } => {
                    let shape = shapes
                        .get(key.as_str())
                        .copied()
                        .unwrap_or_else(|| current(self, key));
                    match shape {
                        None | Some("hash") => {
                            shapes.insert(key.as_str(), Some("hash"));
                        }
                        Some(found) => {
                            return Err(RomError::WrongType {
                                key: key.clone(),
                                expected: "hash",
                                found,
                            });
                        }
                    }
                }
                StoreCommand::SAdd { key, .. } | StoreCommand::SRem { key, .. } => {
                    let shape = shapes
                        .get(key.as_str())
                        .copied()
                        .unwrap_or_else(|| current(self, key));
                    match shape {
                        None | Some("set") => {
                            shapes.insert(key.as_str(), Some("set"));
                        }
                        Some(found) => {
                            return Err(RomError::WrongType {
                                key: key.clone(),
                                expected: "set",
                                found,
                            });
                        }
                    }
                }
                StoreCommand::RPush { key, .. } => {
                    let shape = shapes
                        .get(key.as_str())
                        .copied()
                        .unwrap_or_else(|| current(self, key));
                    match shape {
                        None | Some("list") => {
                            shapes.insert(key.as_str(), Some("list"));
                        }
                        Some(found) => {
                            return Err(RomError::WrongType {
                                key: key.clone(),
                                expected: "list",
                                found,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_command(&mut self, command: &StoreCommand) -> Result<()> {
        match command {
            StoreCommand::Del { keys } => {
                self.apply_del(keys);
            }
            StoreCommand::HSet { key, fields } => self.apply_hset(key, fields)?,
            StoreCommand::HDel { key, fields } => {
                self.apply_hdel(key, fields)?;
            }
            StoreCommand::SAdd { key, members } => {
                self.apply_sadd(key, members)?;
            }
            StoreCommand::SRem { key, members } => {
                self.apply_srem(key, members)?;
            }
            StoreCommand::RPush { key, values } => {
                self.apply_rpush(key, values)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, key: &Key) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.contains_key(key.as_str()))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<Key>> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<Key> = inner
            .entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .map(|key| Key::new(key.clone()))
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn del(&self, keys: &[Key]) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        Ok(inner.apply_del(keys))
    }

    async fn hgetall(&self, key: &Key) -> Result<HashMap<String, RedisValue>> {
        let inner = self.inner.lock().await;
        Ok(inner.hash(key)?.cloned().unwrap_or_default())
    }

    async fn hget(&self, key: &Key, field: &str) -> Result<Option<RedisValue>> {
        let inner = self.inner.lock().await;
        Ok(inner.hash(key)?.and_then(|map| map.get(field).cloned()))
    }

    async fn hset(&self, key: &Key, fields: Vec<(String, RedisValue)>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.apply_hset(key, &fields)
    }

    async fn hdel(&self, key: &Key, fields: &[String]) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        inner.apply_hdel(key, fields)
    }

    async fn sadd(&self, key: &Key, members: Vec<RedisValue>) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        inner.apply_sadd(key, &members)
    }

    async fn srem(&self, key: &Key, members: Vec<RedisValue>) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        inner.apply_srem(key, &members)
    }

    async fn smembers(&self, key: &Key) -> Result<Vec<RedisValue>> {
        let inner = self.inner.lock().await;
        inner.sorted_members(key)
    }

    async fn scard(&self, key: &Key) -> Result<usize> {
        let inner = self.inner.lock().await;
        Ok(inner.set(key)?.map(HashSet::len).unwrap_or(0))
    }

    async fn sscan(&self, key: &Key, cursor: u64) -> Result<(u64, Vec<RedisValue>)> {
        let inner = self.inner.lock().await;
        let members = inner.sorted_members(key)?;
        let start = (cursor as usize).min(members.len());
        let end = (start + SCAN_PAGE).min(members.len());
        let next = if end >= members.len() { 0 } else { end as u64 };
        Ok((next, members[start..end].to_vec()))
    }

    async fn rpush(&self, key: &Key, values: Vec<RedisValue>) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        inner.apply_rpush(key, &values)
    }

    async fn lrange(&self, key: &Key, start: i64, stop: i64) -> Result<Vec<RedisValue>> {
        let inner = self.inner.lock().await;
        let Some(list) = inner.list(key)? else {
            return Ok(Vec::new());
        };
        let len = list.len() as i64;
        let mut start = if start < 0 { len + start } else { start }.max(0);
        let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
        if start > stop || len == 0 {
            return Ok(Vec::new());
        }
        start = start.min(len - 1);
        Ok(list[start as usize..=stop as usize].to_vec())
    }

    async fn lindex(&self, key: &Key, index: i64) -> Result<Option<RedisValue>> {
        let inner = self.inner.lock().await;
        let Some(list) = inner.list(key)? else {
            return Ok(None);
        };
        let len = list.len() as i64;
        let index = if index < 0 { len + index } else { index };
        if index < 0 || index >= len {
            return Ok(None);
        }
        Ok(Some(list[index as usize].clone()))
    }

    async fn llen(&self, key: &Key) -> Result<usize> {
        let inner = self.inner.lock().await;
        Ok(inner.list(key)?.map(Vec::len).unwrap_or(0))
    }

    async fn watch(&self, keys: &[Key]) -> Result<Vec<u64>> {
        let inner = self.inner.lock().await;
        Ok(keys.iter().map(|key| inner.version(key.as_str())).collect())
    }

    async fn execute(&self, batch: CommandBatch) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for (key, watched_version) in &batch.watches {
            if inner.version(key.as_str()) != *watched_version {
                return Err(RomError::Conflict { key: key.clone() });
            }
        }
        inner.validate_batch(&batch.commands)?;
        for command in &batch.commands {
            inner.apply_command(command)?;
        }
        Ok(())
    }
}

/// Redis-style glob matching with `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn matches(pattern: &[u8], text: &[u8]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                matches(&pattern[1..], text) || (!text.is_empty() && matches(pattern, &text[1..]))
            }
            (Some(b'?'), Some(_)) => matches(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => matches(&pattern[1..], &text[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), text.as_bytes())
}
