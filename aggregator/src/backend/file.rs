use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::StorageBackend;
use super::check_quota;
use crate::error::BackendError;

/// Container persisted as one JSON object in a single file.
///
/// Writes go to a sibling temp file which is synced and renamed over the
/// target, so a reader never sees a half-written container.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    tmp_path: PathBuf,
    quota: Option<u64>,
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>, quota: Option<u64>) -> Self {
        let path = path.into();
        let mut tmp_name = path.file_name().map(OsStr::to_os_string).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);
        Self {
            path,
            tmp_path,
            quota,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, BackendError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if data.is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    async fn save(&self, entries: &Map<String, Value>) -> Result<(), BackendError> {
        let data = serde_json::to_vec(entries)?;
        check_quota(data.len() as u64, self.quota)?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        {
            let mut file = fs::File::create(&self.tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&self.tmp_path, &self.path).await?;
        debug!(path = %self.path.display(), bytes = data.len(), "container saved");
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.save(&entries).await
    }

    async fn clear(&self) -> Result<(), BackendError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn bytes_in_use(&self) -> Result<u64, BackendError> {
        match fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}
