use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use tender_protocol::TenderStore;
use tokio::time::Instant;

/// Short-lived copy of the aggregate served to readers.
///
/// Every invalidation bumps a generation counter; a refill started before the
/// bump is discarded so a stale read can never repopulate the cache.
pub struct SnapshotCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    generation: u64,
    snapshot: Option<Snapshot>,
}

struct Snapshot {
    filled_at: Instant,
    data: Arc<TenderStore>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The cached aggregate, if it is younger than the TTL.
    pub fn fresh(&self) -> Option<Arc<TenderStore>> {
        let state = self.lock();
        state
            .snapshot
            .as_ref()
            .filter(|snapshot| snapshot.filled_at.elapsed() < self.ttl)
            .map(|snapshot| Arc::clone(&snapshot.data))
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Store `data` unless the cache was invalidated after `generation` was read.
    pub fn fill(&self, generation: u64, data: TenderStore) -> Arc<TenderStore> {
        let data = Arc::new(data);
        let mut state = self.lock();
        if state.generation == generation {
            state.snapshot = Some(Snapshot {
                filled_at: Instant::now(),
                data: Arc::clone(&data),
            });
        }
        data
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation = state.generation.wrapping_add(1);
        state.snapshot = None;
    }

    /// Drop the snapshot if it is older than `max_age`. Returns whether it was dropped.
    pub fn sweep_if_older_than(&self, max_age: Duration) -> bool {
        let mut state = self.lock();
        let stale = state
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.filled_at.elapsed() > max_age);
        if stale {
            state.snapshot = None;
        }
        stale
    }

    pub fn age(&self) -> Option<Duration> {
        self.lock()
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.filled_at.elapsed())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
