//! Partitioned key-value cache storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::net::Response;

/// Abstraction over partitioned blob storage for testability.
///
/// Partitions are independent named key-value stores created lazily; reading
/// from a partition that was never created behaves like reading from an empty
/// one. Keys are absolute URLs except for the manifest partition, which holds
/// a single well-known key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Ensures the named partition exists.
    async fn open(&self, partition: &str) -> Result<()>;

    /// Looks up an entry by key.
    async fn get(&self, partition: &str, key: &str) -> Result<Option<Response>>;

    /// Stores an entry, creating the partition if needed.
    async fn put(&self, partition: &str, key: &str, response: Response) -> Result<()>;

    /// Removes an entry, returning whether it existed.
    async fn delete(&self, partition: &str, key: &str) -> Result<bool>;

    /// Lists all keys in a partition, in unspecified order.
    async fn keys(&self, partition: &str) -> Result<Vec<String>>;

    /// Deletes a partition and everything in it, returning whether it existed.
    async fn delete_partition(&self, partition: &str) -> Result<bool>;
}

/// In-memory cache store.
///
/// Suitable for tests and for hosts that do not need cached resources to
/// survive a restart; see `DiskStore` for the persistent variant. Clones
/// share the same underlying partitions, so a store can outlive the worker
/// generation that filled it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    partitions: Arc<RwLock<HashMap<String, HashMap<String, Response>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, partition: &str) -> Result<()> {
        self.partitions
            .write()
            .await
            .entry(partition.to_string())
            .or_default();
        Ok(())
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<Response>> {
        Ok(self
            .partitions
            .read()
            .await
            .get(partition)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, partition: &str, key: &str, response: Response) -> Result<()> {
        self.partitions
            .write()
            .await
            .entry(partition.to_string())
            .or_default()
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &str) -> Result<bool> {
        Ok(self
            .partitions
            .write()
            .await
            .get_mut(partition)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .partitions
            .read()
            .await
            .get(partition)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool> {
        Ok(self.partitions.write().await.remove(partition).is_some())
    }
}
