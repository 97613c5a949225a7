//! Rolling statistics over daily closes.

/// Simple moving average with a minimum window of one observation.
///
/// Point `i` averages the last `min(window, i + 1)` values, so early points
/// carry a partial average instead of being undefined. Uses a running sum,
/// O(n) regardless of `window`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        let n = (i + 1).min(window);
        out.push(sum / n as f64);
    }
    out
}

/// Percent change from `first` to `last`. None when `first` is zero or
/// either value is not finite.
pub fn percent_change(first: f64, last: f64) -> Option<f64> {
    if first == 0.0 || !first.is_finite() || !last.is_finite() {
        return None;
    }
    Some((last - first) / first * 100.0)
}
