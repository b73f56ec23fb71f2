use crate::connection::Connection;
use crate::core::{Key, RedisValue, Result};

/// A single queued store mutation.
///
/// Commands are accumulated client-side and shipped to the store in one
/// atomic batch; nothing is visible to other connections until
/// [`Transaction::execute`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    Del {
        keys: Vec<Key>,
    },
    HSet {
        key: Key,
        fields: Vec<(String, RedisValue)>,
    },
    HDel {
        key: Key,
        fields: Vec<String>,
    },
    SAdd {
        key: Key,
        members: Vec<RedisValue>,
    },
    SRem {
        key: Key,
        members: Vec<RedisValue>,
    },
    RPush {
        key: Key,
        values: Vec<RedisValue>,
    },
}

impl StoreCommand {
    /// Keys this command mutates.
    pub fn touched_keys(&self) -> Vec<&Key> {
        match self {
            Self::Del { keys } => keys.iter().collect(),
            Self::HSet { key, .. }
            | Self::HDel { key, .. }
            | Self::SAdd { key, .. }
            | Self::SRem { key, .. }
            | Self::RPush { key, .. } => vec![key],
        }
    }
}

/// Watched keys plus queued commands, ready for atomic execution.
#[derive(Debug, Clone, Default)]
pub struct CommandBatch {
    /// Keys to verify at execute time, with the version observed at watch time.
    pub watches: Vec<(Key, u64)>,
    pub commands: Vec<StoreCommand>,
}

/// An explicit optimistic-lock transaction handle.
///
/// The handle is created by [`Connection::transaction`] or
/// [`Connection::transaction_watching`] and threaded *explicitly* through any
/// code that wants to join the same atomic scope — there is no ambient
/// "current transaction" lookup. Model and collection save/delete entry
/// points come in paired forms (`save` / `save_in`, `delete` / `delete_in`)
/// so callers can either let the engine run its own transaction or pass an
/// open handle down the call chain.
#[derive(Debug, Default)]
pub struct Transaction {
    batch: CommandBatch,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_watches(watches: Vec<(Key, u64)>) -> Self {
        Self {
            batch: CommandBatch {
                watches,
                commands: Vec::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.batch.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batch.commands.len()
    }

    pub fn watched_keys(&self) -> impl Iterator<Item = &Key> {
        self.batch.watches.iter().map(|(key, _)| key)
    }

    pub fn commands(&self) -> &[StoreCommand] {
        &self.batch.commands
    }

    pub fn del(&mut self, keys: Vec<Key>) {
        if !keys.is_empty() {
            self.batch.commands.push(StoreCommand::Del { keys });
        }
    }

    pub fn hset(&mut self, key: Key, fields: Vec<(String, RedisValue)>) {
        if !fields.is_empty() {
            self.batch.commands.push(StoreCommand::HSet { key, fields });
        }
    }

    pub fn hdel(&mut self, key: Key, fields: Vec<String>) {
        if !fields.is_empty() {
            self.batch.commands.push(StoreCommand::HDel { key, fields });
        }
    }

    pub fn sadd(&mut self, key: Key, members: Vec<RedisValue>) {
        if !members.is_empty() {
            self.batch.commands.push(StoreCommand::SAdd { key, members });
        }
    }

    pub fn srem(&mut self, key: Key, members: Vec<RedisValue>) {
        if !members.is_empty() {
            self.batch.commands.push(StoreCommand::SRem { key, members });
        }
    }

    pub fn rpush(&mut self, key: Key, values: Vec<RedisValue>) {
        if !values.is_empty() {
            self.batch.commands.push(StoreCommand::RPush { key, values });
        }
    }

    /// Executes the queued commands atomically.
    ///
    /// If any watched key changed since the watch was taken, nothing is
    /// applied and [`crate::RomError::Conflict`] is returned.
    pub async fn execute(self, cx: &Connection) -> Result<()> {
        if self.batch.commands.is_empty() && self.batch.watches.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            commands = self.batch.commands.len(),
            watches = self.batch.watches.len(),
            "executing transaction"
        );
        cx.store().execute(self.batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mutations_are_not_queued() {
        let mut tx = Transaction::new();
        tx.del(vec![]);
        tx.hset(Key::new("k"), vec![]);
        tx.sadd(Key::new("k"), vec![]);
        assert!(tx.is_empty());
    }

    #[test]
    fn test_commands_preserve_order() {
        let mut tx = Transaction::new();
        tx.del(vec![Key::new("bar:1")]);
        tx.hset(Key::new("bar:1"), vec![("f".into(), "1".into())]);
        tx.sadd(Key::new("bar"), vec!["1".into()]);
        assert_eq!(tx.len(), 3);
        assert!(matches!(tx.commands()[0], StoreCommand::Del { .. }));
        assert!(matches!(tx.commands()[2], StoreCommand::SAdd { .. }));
    }
}
