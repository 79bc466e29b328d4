use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::MutexGuard;
use std::sync::Weak;
use tender_protocol::ContractId;
use tender_protocol::FailureReason;
use tender_protocol::OutboundMessage;
use tender_protocol::SubmitOutcome;
use tender_protocol::TenderRecord;
use tender_protocol::TenderStore;
use tender_protocol::VerifyReport;
use tender_sanitizer::RecordSanitizer;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::backend::StorageBackend;
use crate::backup::write_backup;
use crate::cache::SnapshotCache;
use crate::config::AggregatorConfig;
use crate::error::AggregatorError;
use crate::error::Result;
use crate::error::StoreError;
use crate::merge::MergeStamp;
use crate::merge::merge;
use crate::observer::RecordObserver;
use crate::store::DurableStore;

/// What one maintenance pass saw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthReport {
    pub record_count: usize,
    pub json_bytes: u64,
    pub bytes_in_use: u64,
    pub cache_swept: bool,
}

pub struct CoordinatorBuilder {
    config: AggregatorConfig,
    backend: Arc<dyn StorageBackend>,
    observers: Vec<Arc<dyn RecordObserver>>,
}

impl CoordinatorBuilder {
    pub fn observer(mut self, observer: Arc<dyn RecordObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Result<Coordinator> {
        self.config.validate().map_err(AggregatorError::Config)?;
        let store = DurableStore::new(
            self.backend,
            self.config.retry.policy(),
            self.config.storage_key.clone(),
        );
        Ok(Coordinator {
            inner: Arc::new(Inner {
                sanitizer: RecordSanitizer::new(&self.config.sanitizer),
                cache: SnapshotCache::new(self.config.cache_ttl()),
                config: self.config,
                store,
                in_flight: StdMutex::new(HashSet::new()),
                commit_queue: Mutex::new(()),
                observers: self.observers,
            }),
        })
    }
}

/// Owns every piece of aggregation state. Clones share it.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: AggregatorConfig,
    store: DurableStore,
    sanitizer: RecordSanitizer,
    cache: SnapshotCache,
    /// Keys with a submission between acceptance and completion.
    in_flight: StdMutex<HashSet<String>>,
    /// FIFO: tokio's mutex grants the lock in request order.
    commit_queue: Mutex<()>,
    observers: Vec<Arc<dyn RecordObserver>>,
}

impl Coordinator {
    pub fn builder(config: AggregatorConfig, backend: Arc<dyn StorageBackend>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            backend,
            observers: Vec::new(),
        }
    }

    /// Validate, sanitize, merge and persist one raw candidate record.
    ///
    /// A second submission for a key that is still in flight is answered with
    /// [`SubmitOutcome::Pending`] and has no effect.
    pub async fn submit(&self, raw: Value) -> SubmitOutcome {
        let started = Instant::now();
        let key = match ContractId::extract(&raw) {
            Ok(key) => key,
            Err(err) => {
                warn!(reason = %err.reason(), "rejected record: {err}");
                return SubmitOutcome::Rejected {
                    reason: err.reason(),
                    detail: err.to_string(),
                };
            }
        };

        let Some(marker) = InFlightMarker::acquire(&self.inner.in_flight, &key) else {
            info!(contract_id = %key, "operation already pending");
            return SubmitOutcome::Pending {
                contract_id: key.to_string(),
            };
        };
        let outcome = self.commit(&key, raw, started).await;
        drop(marker);

        self.inner.cache.invalidate();
        if let SubmitOutcome::Committed { record, .. } = &outcome {
            self.notify(record);
        }
        outcome
    }

    async fn commit(&self, key: &ContractId, raw: Value, started: Instant) -> SubmitOutcome {
        let clean = self.inner.sanitizer.sanitize(raw);
        let incoming = match TenderRecord::from_value(clean) {
            Ok(record) => record,
            Err(err) => {
                warn!(contract_id = %key, "undecodable record: {err}");
                return SubmitOutcome::Rejected {
                    reason: FailureReason::MalformedRecord,
                    detail: err.to_string(),
                };
            }
        };

        let _queue = self.inner.commit_queue.lock().await;
        let mut store = match self.inner.store.read_all().await {
            Ok(store) => store,
            Err(err) => return failed(key, FailureReason::StorageReadFailed, &err),
        };

        let stamp = MergeStamp::new(OffsetDateTime::now_utc(), started.elapsed());
        let merged = merge(store.get(key.as_str()), incoming, key, stamp);
        let is_new = !store.contains_key(key.as_str());
        store.insert(key.to_string(), merged.clone());

        if let Err(err) = self.inner.store.write_all(&store).await {
            return failed(key, FailureReason::StorageWriteFailed, &err);
        }

        match self.inner.store.verify(key.as_str()).await {
            Ok(report) if report.found => {
                info!(
                    contract_id = %key,
                    is_new,
                    suppliers = merged.supplier_count(),
                    categories = merged.category_count(),
                    total = report.total_count,
                    "record committed"
                );
                SubmitOutcome::Committed {
                    contract_id: key.to_string(),
                    record: merged,
                }
            }
            Ok(report) => {
                warn!(
                    contract_id = %key,
                    total = report.total_count,
                    available = ?report.available_contracts,
                    "record missing after write"
                );
                SubmitOutcome::Failed {
                    contract_id: key.to_string(),
                    reason: FailureReason::VerificationFailed,
                    detail: format!(
                        "record not found after write ({} records stored)",
                        report.total_count
                    ),
                    verification: Some(report),
                }
            }
            Err(err) => failed(key, FailureReason::VerificationFailed, &err),
        }
    }

    fn notify(&self, record: &TenderRecord) {
        let message = OutboundMessage::DataUpdated {
            contract_id: record.contract_id.clone(),
            data: record.clone(),
        };
        for observer in &self.inner.observers {
            if let Err(err) = observer.record_updated(&message) {
                debug!(contract_id = %record.contract_id, "update notification dropped: {err}");
            }
        }
    }

    /// The whole aggregate, served from memory while the snapshot is fresh.
    pub async fn read_all(&self) -> std::result::Result<Arc<TenderStore>, StoreError> {
        if let Some(snapshot) = self.inner.cache.fresh() {
            return Ok(snapshot);
        }
        let generation = self.inner.cache.generation();
        let store = self.inner.store.read_all().await?;
        Ok(self.inner.cache.fill(generation, store))
    }

    pub async fn verify(&self, contract_id: &str) -> std::result::Result<VerifyReport, StoreError> {
        self.inner.store.verify(contract_id.trim()).await
    }

    pub async fn clear_all(&self) -> std::result::Result<(), StoreError> {
        let _queue = self.inner.commit_queue.lock().await;
        let result = self.inner.store.clear().await;
        self.inner.cache.invalidate();
        result?;
        info!("all tender data cleared");
        Ok(())
    }

    pub async fn usage(&self) -> std::result::Result<u64, StoreError> {
        self.inner.store.usage().await
    }

    pub async fn export_backup(&self, dir: &Path) -> Result<PathBuf> {
        let snapshot = self.read_all().await?;
        write_backup(dir, &snapshot, OffsetDateTime::now_utc().date()).await
    }

    pub fn is_in_flight(&self, contract_id: &str) -> bool {
        lock_markers(&self.inner.in_flight).contains(contract_id.trim())
    }

    /// Drop a stale read snapshot and log storage figures.
    pub async fn health_check(&self) -> std::result::Result<HealthReport, StoreError> {
        let cache_swept = self
            .inner
            .cache
            .sweep_if_older_than(self.inner.config.cache_stale_after());
        let store = self.inner.store.read_all().await?;
        let json_bytes = serde_json::to_vec(&store).map_or(0, |data| data.len() as u64);
        let bytes_in_use = self.inner.store.usage().await?;
        let report = HealthReport {
            record_count: store.len(),
            json_bytes,
            bytes_in_use,
            cache_swept,
        };
        info!(
            records = report.record_count,
            json_bytes,
            bytes_in_use,
            cache_swept,
            "storage health check"
        );
        Ok(report)
    }

    /// Run [`Coordinator::health_check`] on the configured interval until every
    /// handle to this coordinator is dropped.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let period = self.inner.config.maintenance_interval();
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    debug!("coordinator dropped; maintenance stopping");
                    break;
                };
                let coordinator = Coordinator { inner };
                if let Err(err) = coordinator.health_check().await {
                    warn!("storage health check failed: {err}");
                }
            }
        })
    }
}

fn failed(key: &ContractId, reason: FailureReason, err: &StoreError) -> SubmitOutcome {
    warn!(contract_id = %key, %reason, "commit failed: {err}");
    SubmitOutcome::Failed {
        contract_id: key.to_string(),
        reason,
        detail: err.to_string(),
        verification: None,
    }
}

fn lock_markers(markers: &StdMutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    match markers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Holds a key in the in-flight set; released on drop, including when the
/// submitting future is cancelled.
struct InFlightMarker<'a> {
    markers: &'a StdMutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlightMarker<'a> {
    fn acquire(markers: &'a StdMutex<HashSet<String>>, key: &ContractId) -> Option<Self> {
        if !lock_markers(markers).insert(key.to_string()) {
            return None;
        }
        Some(Self {
            markers,
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightMarker<'_> {
    fn drop(&mut self) {
        lock_markers(self.markers).remove(&self.key);
    }
}
