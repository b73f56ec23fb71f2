pub mod config;

pub use config::StoreConfig;

use std::future::Future;
use std::sync::Arc;

use crate::core::{Key, Result, RomError};
use crate::store::{MemoryStore, Store, Transaction};

/// Entry point to a configured store.
///
/// Owns the configuration and the backend; hands out cheap [`Connection`]
/// handles. The backend is injected at construction, so tests and embedded
/// deployments run against [`MemoryStore`] while a networked deployment
/// plugs in its own [`Store`] implementation.
pub struct Client {
    config: StoreConfig,
    store: Arc<dyn Store>,
}

impl Client {
    /// Open a client over an explicit backend.
    pub fn open(config: StoreConfig, store: Arc<dyn Store>) -> Result<Self> {
        config.validate().map_err(RomError::Config)?;
        Ok(Self { config, store })
    }

    /// Open a client backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self {
            config: StoreConfig::default(),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Open an in-memory client with explicit configuration.
    pub fn in_memory_with_config(config: StoreConfig) -> Result<Self> {
        Self::open(config, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Acquire a connection handle.
    pub fn connection(&self) -> Connection {
        Connection {
            store: Arc::clone(&self.store),
        }
    }
}

/// A clonable handle on the store, threaded through every operation.
///
/// Cloning is cheap (a reference-count bump); all clones observe the same
/// backend state. Reentrancy is explicit: code that must participate in an
/// enclosing atomic scope receives the open [`Transaction`] handle as an
/// argument rather than looking one up ambiently.
#[derive(Clone)]
pub struct Connection {
    store: Arc<dyn Store>,
}

impl Connection {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    /// Start an empty transaction with no watched keys.
    pub fn transaction(&self) -> Transaction {
        Transaction::new()
    }

    /// Start a transaction that watches `keys` for concurrent modification.
    ///
    /// The watch versions are taken now; [`Transaction::execute`] aborts the
    /// whole batch if any watched key changes in between.
    pub async fn transaction_watching(&self, keys: &[Key]) -> Result<Transaction> {
        let versions = self.store.watch(keys).await?;
        Ok(Transaction::with_watches(
            keys.iter().cloned().zip(versions).collect(),
        ))
    }

    /// Convenience wrapper: build a transaction, queue into it, execute it.
    ///
    /// The closure receives the fresh handle by value and returns it
    /// alongside its result; the handle is then executed. Use the explicit
    /// `transaction()` / `execute()` pair when the control flow is more
    /// involved.
    pub async fn with_transaction<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Transaction) -> Fut + Send,
        Fut: Future<Output = Result<(Transaction, T)>> + Send,
        T: Send,
    {
        let (tx, value) = op(self.transaction()).await?;
        tx.execute(self).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = StoreConfig::default().max_connections(0);
        assert!(Client::in_memory_with_config(config).is_err());
    }

    #[tokio::test]
    async fn test_connections_share_the_backend() {
        let client = Client::in_memory();
        let a = client.connection();
        let b = client.connection();
        a.store()
            .sadd(&Key::new("shared"), vec!["x".into()])
            .await
            .unwrap();
        assert_eq!(b.store().scard(&Key::new("shared")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_with_transaction_commits() {
        let client = Client::in_memory();
        let cx = client.connection();
        cx.with_transaction(|mut tx| async move {
            tx.sadd(Key::new("s"), vec!["a".into()]);
            Ok((tx, ()))
        })
        .await
        .unwrap();
        assert_eq!(cx.store().scard(&Key::new("s")).await.unwrap(), 1);
    }
}
