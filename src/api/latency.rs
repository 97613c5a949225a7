//! In-memory latency histogram for upstream round trips.
//! Recorded by the fetcher around every provider call.

use std::sync::Mutex;
use std::time::Duration;

/// Shared latency stats. Fetcher records, API reads.
/// Values stored in milliseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// Create a new histogram. Tracks 1ms to 10min, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 600_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    /// Record from a std::time::Duration. Values are clamped into the tracked range.
    pub fn record(&self, d: Duration) {
        let ms = (d.as_millis().min(600_000) as u64).max(1);
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(ms);
        }
    }

    /// Return (p50_ms, p95_ms, p99_ms). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        let p50 = h.value_at_quantile(0.5);
        let p95 = h.value_at_quantile(0.95);
        let p99 = h.value_at_quantile(0.99);
        (Some(p50), Some(p95), Some(p99))
    }

    /// Sample count.
    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
