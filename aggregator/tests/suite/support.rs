use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use tender_aggregator::AggregatorConfig;
use tender_aggregator::BackendError;
use tender_aggregator::Coordinator;
use tender_aggregator::MemoryBackend;
use tender_aggregator::NotifyError;
use tender_aggregator::RecordObserver;
use tender_aggregator::StorageBackend;
use tender_protocol::OutboundMessage;
use tokio::sync::Semaphore;

/// Memory container with knobs for failures, lost writes and stalled writes.
#[derive(Default)]
pub struct ScriptedBackend {
    inner: MemoryBackend,
    gets: AtomicU32,
    sets: AtomicU32,
    failing_gets: AtomicU32,
    failing_sets: AtomicU32,
    usage_calls: AtomicU32,
    failing_usage: AtomicU32,
    drop_writes: AtomicBool,
    gate: Option<Semaphore>,
    written_keys: Mutex<Vec<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `set` waits for a permit from [`ScriptedBackend::release_writes`].
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        })
    }

    pub fn fail_next_gets(&self, count: u32) {
        self.failing_gets.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_sets(&self, count: u32) {
        self.failing_sets.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_usage(&self, count: u32) {
        self.failing_usage.store(count, Ordering::SeqCst);
    }

    /// Acknowledge writes without storing them.
    pub fn drop_writes(&self) {
        self.drop_writes.store(true, Ordering::SeqCst);
    }

    pub fn release_writes(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn gets(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> u32 {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn usage_calls(&self) -> u32 {
        self.usage_calls.load(Ordering::SeqCst)
    }

    /// Keys of the aggregate passed to each successful `set`, in call order.
    pub fn written_keys(&self) -> Vec<Vec<String>> {
        self.written_keys.lock().unwrap().clone()
    }

    pub async fn seed(&self, key: &str, value: Value) {
        self.inner.set(key, value).await.unwrap();
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl StorageBackend for ScriptedBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, BackendError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_gets) {
            return Err(BackendError::Unavailable("scripted read failure".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BackendError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|err| BackendError::Unavailable(err.to_string()))?
                .forget();
        }
        if take_failure(&self.failing_sets) {
            return Err(BackendError::Unavailable("scripted write failure".to_string()));
        }
        if self.drop_writes.load(Ordering::SeqCst) {
            return Ok(());
        }
        let keys = value
            .as_object()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        self.written_keys.lock().unwrap().push(keys);
        self.inner.set(key, value).await
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.inner.clear().await
    }

    async fn bytes_in_use(&self) -> Result<u64, BackendError> {
        self.usage_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_usage) {
            return Err(BackendError::Unavailable("scripted usage failure".to_string()));
        }
        self.inner.bytes_in_use().await
    }
}

/// Keeps every message it is handed.
#[derive(Default)]
pub struct RecordingObserver {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingObserver {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl RecordObserver for RecordingObserver {
    fn record_updated(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Fails every delivery.
pub struct BrokenObserver;

impl RecordObserver for BrokenObserver {
    fn record_updated(&self, _message: &OutboundMessage) -> Result<(), NotifyError> {
        Err(NotifyError::Failed("receiving end does not exist".to_string()))
    }
}

pub fn coordinator_over(backend: Arc<ScriptedBackend>) -> Coordinator {
    Coordinator::builder(AggregatorConfig::default(), backend)
        .build()
        .unwrap()
}

/// Yield until `contract_id` is marked in flight.
pub async fn wait_in_flight(coordinator: &Coordinator, contract_id: &str) {
    for _ in 0..1_000 {
        if coordinator.is_in_flight(contract_id) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("{contract_id} never became in flight");
}
