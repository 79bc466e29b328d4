use thiserror::Error;

/// Failures reported by a [`crate::StorageBackend`] for a single call.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Quota exceeded: {requested} bytes requested, {quota} bytes allowed")]
    QuotaExceeded { requested: u64, quota: u64 },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreOperation {
    Read,
    Write,
    Clear,
    Usage,
}

/// Failures of the durable store adapter, after retries.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage {operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: StoreOperation,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("Stored aggregate is unreadable: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("Aggregate could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub fn operation(&self) -> StoreOperation {
        match self {
            StoreError::Exhausted { operation, .. } => *operation,
            StoreError::Corrupt(_) => StoreOperation::Read,
            StoreError::Encode(_) => StoreOperation::Write,
        }
    }
}

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backup error: {0}")]
    Backup(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
