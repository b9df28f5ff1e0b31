use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use cadence_core::{traits::CacheStore, SchedulerResult};

/// 进程内键值缓存
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryCacheStore {
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

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> SchedulerResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> SchedulerResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> SchedulerResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> SchedulerResult<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }
}
