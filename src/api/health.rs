//! Shared health counters for the /health endpoint.
//! Updated by StockDataFetcher on every fetch, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::FetchError;

#[derive(Default)]
pub struct HealthState {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    /// Requests sent to the provider (a batched download counts once).
    pub upstream_calls: AtomicU64,
    /// Fetches that ended with nothing to show (empty series, unknown symbol).
    pub no_data: AtomicU64,
    /// Fetches that ended because the provider broke.
    pub upstream_failures: AtomicU64,
}

/// Point-in-time copy of [`HealthState`] for serialization.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_calls: u64,
    pub no_data: u64,
    pub upstream_failures: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_call(&self) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, err: &FetchError) {
        let counter = if err.is_expected() { &self.no_data } else { &self.upstream_failures };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            no_data: self.no_data.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}
