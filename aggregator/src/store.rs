use serde_json::Value;
use std::sync::Arc;
use tender_protocol::TenderStore;
use tender_protocol::VerifyReport;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::error::StoreOperation;
use crate::retry::RetryPolicy;

/// How many other keys a failed lookup reports back.
const AVAILABLE_CONTRACTS_SAMPLE: usize = 5;

/// Reads and writes the whole aggregate as one container entry.
#[derive(Clone)]
pub struct DurableStore {
    backend: Arc<dyn StorageBackend>,
    retry: RetryPolicy,
    entry_key: String,
}

impl DurableStore {
    pub fn new(backend: Arc<dyn StorageBackend>, retry: RetryPolicy, entry_key: impl Into<String>) -> Self {
        Self {
            backend,
            retry,
            entry_key: entry_key.into(),
        }
    }

    pub fn entry_key(&self) -> &str {
        &self.entry_key
    }

    /// An absent entry is an empty aggregate.
    pub async fn read_all(&self) -> Result<TenderStore, StoreError> {
        let backend = &self.backend;
        let key = self.entry_key.as_str();
        let raw = self
            .retry
            .run(StoreOperation::Read, move || backend.get(key))
            .await?;
        match raw {
            None | Some(Value::Null) => Ok(TenderStore::new()),
            Some(value) => serde_json::from_value(value).map_err(StoreError::Corrupt),
        }
    }

    pub async fn write_all(&self, store: &TenderStore) -> Result<(), StoreError> {
        let value = serde_json::to_value(store).map_err(StoreError::Encode)?;
        let json_bytes = serde_json::to_vec(&value).map_err(StoreError::Encode)?.len();
        // Logged only; a failing usage query must not delay the write.
        match self.backend.bytes_in_use().await {
            Ok(bytes_in_use) => info!(
                records = store.len(),
                json_bytes,
                bytes_in_use,
                "writing aggregate"
            ),
            Err(err) => warn!(records = store.len(), json_bytes, "storage usage unavailable: {err}"),
        }

        let backend = &self.backend;
        let key = self.entry_key.as_str();
        self.retry
            .run(StoreOperation::Write, move || backend.set(key, value.clone()))
            .await
    }

    /// Re-read storage and look `contract_id` up.
    pub async fn verify(&self, contract_id: &str) -> Result<VerifyReport, StoreError> {
        let mut store = self.read_all().await?;
        let total_count = store.len();
        let record = store.remove(contract_id);
        let available_contracts = if record.is_some() {
            Vec::new()
        } else {
            store.keys().take(AVAILABLE_CONTRACTS_SAMPLE).cloned().collect()
        };
        debug!(contract_id, found = record.is_some(), total_count, "verified storage");
        Ok(VerifyReport {
            found: record.is_some(),
            record,
            total_count,
            available_contracts,
        })
    }

    pub async fn usage(&self) -> Result<u64, StoreError> {
        let backend = &self.backend;
        self.retry
            .run(StoreOperation::Usage, move || backend.bytes_in_use())
            .await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let backend = &self.backend;
        self.retry
            .run(StoreOperation::Clear, move || backend.clear())
            .await
    }
}
