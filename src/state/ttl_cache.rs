#[cfg(test)]
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Time source for entry timestamps. Swapped out in tests to step past the TTL.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_ms: AtomicU64,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { base: Instant::now(), offset_ms: AtomicU64::new(0) })
    }

    pub fn advance(&self, by: Duration) {
        let ms = by.as_millis().min(u128::from(u64::MAX)) as u64;
        self.offset_ms.fetch_add(ms, Ordering::Relaxed);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::Relaxed))
    }
}

// ---------------------------------------------------------------------------
// TtlCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    stored_at: Instant,
}

/// String-keyed cache with lazy expiry. Stale entries are ignored on read
/// and stay in the map until the key is written again.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    #[cfg(test)]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), ttl, clock }
    }

    /// Payload for `key` if it was stored less than `ttl` ago.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        let age = self.clock.now().saturating_duration_since(entry.stored_at);
        if age < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store `payload` under `key`, replacing whatever was there.
    pub fn put(&self, key: impl Into<String>, payload: V) {
        let entry = CacheEntry { payload, stored_at: self.clock.now() };
        self.entries.insert(key.into(), entry);
    }

    /// Physical entry count, stale entries included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
