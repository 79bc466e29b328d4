use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::StorageBackend;
use super::check_quota;
use super::entries_size;
use crate::error::BackendError;

/// Process-local container. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, Value>>,
    quota: Option<u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: Option<u64>) -> Self {
        Self {
            entries: Mutex::default(),
            quota,
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        let mut entries = self.entries.lock().await;
        let others = entries_size(entries.iter().filter(|(name, _)| name.as_str() != key))?;
        let requested = others + key.len() as u64 + serde_json::to_vec(&value)?.len() as u64;
        check_quota(requested, self.quota)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<u64, BackendError> {
        entries_size(self.entries.lock().await.iter())
    }
}
