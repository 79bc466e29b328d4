//! Key-value containers the durable store adapter persists into.

mod file;
mod memory;

pub use file::JsonFileBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BackendError;

/// Async key-value container with the shape of a browser extension's local
/// storage area. Each call is a single attempt; retries live in the adapter.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), BackendError>;

    async fn bytes_in_use(&self) -> Result<u64, BackendError>;
}

/// Bytes an entry set occupies: keys plus compact JSON values.
pub(crate) fn entries_size<'a>(
    entries: impl IntoIterator<Item = (&'a String, &'a Value)>,
) -> Result<u64, BackendError> {
    let mut total = 0u64;
    for (key, value) in entries {
        total += key.len() as u64 + serde_json::to_vec(value)?.len() as u64;
    }
    Ok(total)
}

pub(crate) fn check_quota(requested: u64, quota: Option<u64>) -> Result<(), BackendError> {
    match quota {
        Some(quota) if requested > quota => Err(BackendError::QuotaExceeded { requested, quota }),
        _ => Ok(()),
    }
}
