use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entry::CacheEntry;
use crate::error::StorageError;
use crate::traits::PropositionCache;

/// Process-local cache, for tests and hosts without a writable directory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl PropositionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        check_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), StorageError> {
        check_key(key)?;
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}
