/*!
# Tender Aggregator

Merges scraped tender observations into one persisted aggregate keyed by
contract id.

## Features

- **Merge engine**: last observation wins for scalars; suppliers, categories
  and provenance only ever grow
- **One operation per key**: a second submission for an in-flight key is
  answered as pending
- **Ordered commits**: read, merge, write and verify run behind one FIFO queue
- **Bounded retry**: storage calls back off from 100 ms, doubling, 5 attempts
- **Read cache**: `read_all` serves a shared snapshot for 5 seconds

## Example

```rust,no_run
use serde_json::json;
use std::sync::Arc;
use tender_aggregator::AggregatorConfig;
use tender_aggregator::Coordinator;
use tender_aggregator::JsonFileBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AggregatorConfig::default();
    let backend = Arc::new(JsonFileBackend::new("tender-data.json", config.quota()));
    let coordinator = Coordinator::builder(config, backend).build()?;

    let outcome = coordinator
        .submit(json!({ "contract_id": "VT-1042", "title": "Bridge repairs" }))
        .await;
    println!("{outcome:?}");

    Ok(())
}
```
*/

mod backend;
mod backup;
mod cache;
mod config;
mod coordinator;
mod error;
mod merge;
mod observer;
mod retry;
mod store;

pub use backend::JsonFileBackend;
pub use backend::MemoryBackend;
pub use backend::StorageBackend;
pub use backup::backup_file_name;
pub use backup::write_backup;
pub use cache::SnapshotCache;
pub use config::AggregatorConfig;
pub use config::DEFAULT_QUOTA_BYTES;
pub use config::RetryConfig;
pub use coordinator::Coordinator;
pub use coordinator::CoordinatorBuilder;
pub use coordinator::HealthReport;
pub use error::AggregatorError;
pub use error::BackendError;
pub use error::Result;
pub use error::StoreError;
pub use error::StoreOperation;
pub use merge::MergeStamp;
pub use merge::merge;
pub use observer::BroadcastObserver;
pub use observer::NotifyError;
pub use observer::RecordObserver;
pub use retry::RetryPolicy;
pub use store::DurableStore;
