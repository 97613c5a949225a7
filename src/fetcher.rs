use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{MA_LONG_WINDOW, MA_SHORT_WINDOW};
use crate::error::FetchError;
use crate::indicators::{percent_change, rolling_mean};
use crate::provider::MarketDataProvider;
use crate::state::{Clock, SystemClock, TtlCache};
use crate::types::{
    round2, DailyBar, DeltaRow, HistoryPoint, MovingAverageResult, TrackedSymbol,
};

/// What the fetcher keeps in its cache; one variant per fetch operation.
#[derive(Debug, Clone)]
enum CachedPayload {
    Delta(Arc<Vec<DeltaRow>>),
    MovingAverages(Arc<MovingAverageResult>),
}

/// Fetches deltas and moving averages from a [`MarketDataProvider`],
/// memoizing results for the cache TTL.
///
/// Neither operation returns an error: failures are logged, counted in
/// [`HealthState`] and come back as an empty list / `None`.
pub struct StockDataFetcher {
    provider: Arc<dyn MarketDataProvider>,
    cache: TtlCache<CachedPayload>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl StockDataFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self::with_clock(provider, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<dyn MarketDataProvider>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            cache: TtlCache::with_clock(ttl, clock),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    pub fn latency(&self) -> &Arc<LatencyStats> {
        &self.latency
    }

    /// Physical cache entry count (stale entries included).
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    // -----------------------------------------------------------------------
    // Delta
    // -----------------------------------------------------------------------

    /// Percent change of adjusted close over the last `days` days for each
    /// symbol, highest first. Symbols the provider has no data for are left out.
    pub async fn fetch_delta(&self, symbols: &[TrackedSymbol], days: u32) -> Arc<Vec<DeltaRow>> {
        match self.try_fetch_delta(symbols, days).await {
            Ok(rows) => rows,
            Err(e) => {
                self.log_failure("delta", &delta_cache_key(symbols, days), &e);
                Arc::new(Vec::new())
            }
        }
    }

    async fn try_fetch_delta(
        &self,
        symbols: &[TrackedSymbol],
        days: u32,
    ) -> Result<Arc<Vec<DeltaRow>>, FetchError> {
        if symbols.is_empty() {
            return Err(FetchError::InvalidRequest("empty symbol set".to_string()));
        }
        if days == 0 {
            return Err(FetchError::InvalidRequest("days must be positive".to_string()));
        }

        let key = delta_cache_key(symbols, days);
        if let Some(CachedPayload::Delta(rows)) = self.cache.get(&key) {
            self.health.record_hit();
            info!(key = %key, rows = rows.len(), "delta served from cache");
            return Ok(rows);
        }
        self.health.record_miss();

        let (start, end) = window(days);
        let tickers: Vec<String> = symbols.iter().map(|s| s.ticker.clone()).collect();
        info!(days, tickers = tickers.len(), "fetching delta data from upstream");

        let series = self
            .timed(self.provider.download(&tickers, start, end))
            .await?;
        if series.values().all(|bars| bars.is_empty()) {
            return Err(FetchError::NoDataAvailable);
        }

        let mut rows = Vec::with_capacity(symbols.len());
        for sym in symbols {
            let bars = series.get(&sym.ticker).map(Vec::as_slice).unwrap_or_default();
            match delta_row(sym, bars, start, end) {
                Some(row) => rows.push(row),
                None => debug!(ticker = %sym.ticker, "no usable series, row dropped"),
            }
        }
        // Stable: equal deltas keep watchlist order.
        rows.sort_by(|a, b| b.delta_percent.total_cmp(&a.delta_percent));

        let rows = Arc::new(rows);
        self.cache.put(key, CachedPayload::Delta(Arc::clone(&rows)));
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Moving averages
    // -----------------------------------------------------------------------

    /// Latest price, previous close, period high/low and 50/200-day moving
    /// averages for one symbol over the last `days` days.
    pub async fn fetch_moving_averages(
        &self,
        symbol: &str,
        days: u32,
    ) -> Option<Arc<MovingAverageResult>> {
        match self.try_fetch_moving_averages(symbol, days).await {
            Ok(result) => Some(result),
            Err(e) => {
                self.log_failure("moving_averages", &ma_cache_key(symbol, days), &e);
                None
            }
        }
    }

    async fn try_fetch_moving_averages(
        &self,
        symbol: &str,
        days: u32,
    ) -> Result<Arc<MovingAverageResult>, FetchError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(FetchError::InvalidRequest("empty symbol".to_string()));
        }
        if days == 0 {
            return Err(FetchError::InvalidRequest("days must be positive".to_string()));
        }

        let key = ma_cache_key(symbol, days);
        if let Some(CachedPayload::MovingAverages(result)) = self.cache.get(&key) {
            self.health.record_hit();
            info!(key = %key, "moving averages served from cache");
            return Ok(result);
        }
        self.health.record_miss();

        info!(symbol, days, "fetching moving averages from upstream");

        let profile = match self.timed(self.provider.profile(symbol)).await {
            Ok(p) => p,
            Err(FetchError::Upstream(e)) | Err(FetchError::Malformed(e)) => {
                warn!(symbol, "profile lookup failed: {e}");
                return Err(FetchError::UnrecognizedSymbol(symbol.to_string()));
            }
            Err(e) => return Err(e),
        };
        if !profile.is_recognized() {
            warn!(symbol, "no exchange timezone for symbol, may be unsupported");
            return Err(FetchError::UnrecognizedSymbol(symbol.to_string()));
        }

        let (start, end) = window(days);
        let bars = self
            .timed(self.provider.history(symbol, start, end))
            .await?;
        let result = moving_average_result(symbol, &bars, start, end)
            .ok_or(FetchError::NoDataAvailable)?;

        let result = Arc::new(result);
        self.cache.put(key, CachedPayload::MovingAverages(Arc::clone(&result)));
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Await one provider call, counting it and recording its latency.
    async fn timed<T>(&self, call: impl Future<Output = T>) -> T {
        self.health.record_upstream_call();
        let started = Instant::now();
        let out = call.await;
        self.latency.record(started.elapsed());
        out
    }

    fn log_failure(&self, op: &str, key: &str, err: &FetchError) {
        self.health.record_failure(err);
        if err.is_expected() {
            warn!(op, key, "no data: {err}");
        } else {
            error!(op, key, "fetch failed: {err}");
        }
    }
}

// ---------------------------------------------------------------------------
// Pure computations
// ---------------------------------------------------------------------------

/// `[today - days, today]` in UTC.
fn window(days: u32) -> (NaiveDate, NaiveDate) {
    let end = Utc::now().date_naive();
    let start = end
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    (start, end)
}

/// Order-independent key: the same symbol set and window always hit the same entry.
pub fn delta_cache_key(symbols: &[TrackedSymbol], days: u32) -> String {
    let mut pairs: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}:{}", s.ticker, s.name))
        .collect();
    pairs.sort();
    format!("delta_{}_{}", pairs.join(","), days)
}

pub fn ma_cache_key(symbol: &str, days: u32) -> String {
    format!("ma_{}_{}", symbol.trim(), days)
}

/// Row for one symbol, or None when the series is empty or starts at zero.
fn delta_row(
    sym: &TrackedSymbol,
    bars: &[DailyBar],
    start: NaiveDate,
    end: NaiveDate,
) -> Option<DeltaRow> {
    let first = bars.first()?.adj_close;
    let last = bars.last()?.adj_close;
    let delta = percent_change(first, last)?;
    Some(DeltaRow {
        symbol: sym.ticker.clone(),
        name: sym.name.clone(),
        delta_percent: round2(delta),
        last_price: round2(last),
        start_date: start,
        end_date: end,
    })
}

fn moving_average_result(
    symbol: &str,
    bars: &[DailyBar],
    start: NaiveDate,
    end: NaiveDate,
) -> Option<MovingAverageResult> {
    let latest = bars.last()?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ma_50 = rolling_mean(&closes, MA_SHORT_WINDOW);
    let ma_200 = rolling_mean(&closes, MA_LONG_WINDOW);

    let prev_close = match bars.len() {
        n if n >= 2 => bars[n - 2].close,
        _ => latest.close,
    };
    let period_high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let period_low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    let history: Vec<HistoryPoint> = bars
        .iter()
        .zip(ma_50.iter().zip(ma_200.iter()))
        .map(|(b, (&m50, &m200))| HistoryPoint {
            date: b.date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            ma_50: m50,
            ma_200: m200,
        })
        .collect();

    Some(MovingAverageResult {
        symbol: symbol.to_string(),
        current_price: latest.close,
        prev_close,
        period_high,
        period_low,
        ma_50: *ma_50.last()?,
        ma_200: *ma_200.last()?,
        history,
        start_date: start,
        end_date: end,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::state::ttl_cache::ManualClock;
    use crate::types::SymbolProfile;

    /// In-memory provider with per-operation call counters.
    #[derive(Default)]
    pub(crate) struct MockProvider {
        /// ticker -> bars returned by download/history
        pub series: Mutex<HashMap<String, Vec<DailyBar>>>,
        /// tickers whose profile has no timezone
        pub unrecognized: Vec<String>,
        pub fail_download: bool,
        pub fail_profile: bool,
        pub fail_history: bool,
        pub download_calls: AtomicUsize,
        pub profile_calls: AtomicUsize,
        pub history_calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn with_adj_closes(entries: &[(&str, &[f64])]) -> Self {
            let series = entries
                .iter()
                .map(|(t, closes)| (t.to_string(), bars_from_closes(closes)))
                .collect();
            Self { series: Mutex::new(series), ..Default::default() }
        }

        pub fn with_bars(ticker: &str, bars: Vec<DailyBar>) -> Self {
            let series = HashMap::from([(ticker.to_string(), bars)]);
            Self { series: Mutex::new(series), ..Default::default() }
        }
    }

    pub(crate) fn bars_from_closes(closes: &[f64]) -> Vec<DailyBar> {
        let day0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| DailyBar {
                date: day0 + Days::new(i as u64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                adj_close: c,
            })
            .collect()
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn download(
            &self,
            tickers: &[String],
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<HashMap<String, Vec<DailyBar>>, FetchError> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_download {
                return Err(FetchError::Upstream("connection reset".into()));
            }
            let series = self.series.lock().unwrap();
            Ok(tickers
                .iter()
                .filter_map(|t| series.get(t).map(|b| (t.clone(), b.clone())))
                .collect())
        }

        async fn profile(&self, ticker: &str) -> Result<SymbolProfile, FetchError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_profile {
                return Err(FetchError::Upstream("HTTP 500".into()));
            }
            let timezone = if self.unrecognized.iter().any(|t| t == ticker) {
                None
            } else {
                Some("America/New_York".to_string())
            };
            Ok(SymbolProfile {
                symbol: ticker.to_string(),
                timezone,
                exchange: Some("NMS".into()),
                currency: Some("USD".into()),
            })
        }

        async fn history(
            &self,
            ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<DailyBar>, FetchError> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_history {
                return Err(FetchError::Malformed("unexpected EOF".into()));
            }
            Ok(self.series.lock().unwrap().get(ticker).cloned().unwrap_or_default())
        }
    }

    fn fetcher(provider: &Arc<MockProvider>) -> StockDataFetcher {
        StockDataFetcher::new(provider.clone(), Duration::from_secs(300))
    }

    fn watchlist(pairs: &[(&str, &str)]) -> Vec<TrackedSymbol> {
        pairs.iter().map(|(n, t)| TrackedSymbol::new(*n, *t)).collect()
    }

    // --- delta ---

    #[tokio::test]
    async fn delta_percent_and_last_price() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[("AAPL", &[100.0, 110.0])]));
        let rows = fetcher(&provider).fetch_delta(&watchlist(&[("Apple", "AAPL")]), 7).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].delta_percent, 10.0);
        assert_eq!(rows[0].last_price, 110.0);
        assert_eq!(rows[0].name, "Apple");
        assert_eq!(rows[0].symbol, "AAPL");
        assert!(rows[0].start_date < rows[0].end_date);
    }

    #[tokio::test]
    async fn delta_rows_sorted_descending_with_stable_ties() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[
            ("A", &[100.0, 95.0]),
            ("B", &[100.0, 120.0]),
            ("C", &[50.0, 55.0]),
            ("D", &[10.0, 11.0]),
            ("E", &[200.0, 200.0]),
        ]));
        let symbols = watchlist(&[("a", "A"), ("b", "B"), ("c", "C"), ("d", "D"), ("e", "E")]);
        let rows = fetcher(&provider).fetch_delta(&symbols, 30).await;

        let order: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "D", "E", "A"]);
        assert!(rows.windows(2).all(|w| w[0].delta_percent >= w[1].delta_percent));
    }

    #[tokio::test]
    async fn delta_drops_missing_symbols() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[
            ("AAPL", &[100.0, 101.0]),
            ("MSFT", &[300.0, 330.0]),
        ]));
        let symbols = watchlist(&[("Apple", "AAPL"), ("Ghost", "ZZZZ"), ("Microsoft", "MSFT")]);
        let rows = fetcher(&provider).fetch_delta(&symbols, 7).await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.symbol != "ZZZZ"));
    }

    #[tokio::test]
    async fn delta_second_call_within_ttl_hits_cache() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[("AAPL", &[100.0, 110.0])]));
        let f = fetcher(&provider);
        let symbols = watchlist(&[("Apple", "AAPL")]);

        let first = f.fetch_delta(&symbols, 7).await;
        let second = f.fetch_delta(&symbols, 7).await;
        assert_eq!(first, second);
        assert_eq!(provider.download_calls.load(Ordering::SeqCst), 1);

        let h = f.health().snapshot();
        assert_eq!((h.cache_hits, h.cache_misses, h.upstream_calls), (1, 1, 1));
    }

    #[tokio::test]
    async fn delta_refetched_after_ttl() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[("AAPL", &[100.0, 110.0])]));
        let clock = ManualClock::new();
        let f = StockDataFetcher::with_clock(provider.clone(), Duration::from_secs(300), clock.clone());
        let symbols = watchlist(&[("Apple", "AAPL")]);

        f.fetch_delta(&symbols, 7).await;
        clock.advance(Duration::from_secs(301));
        f.fetch_delta(&symbols, 7).await;
        assert_eq!(provider.download_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delta_cache_key_ignores_input_order_but_not_days() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[
            ("AAPL", &[100.0, 110.0]),
            ("MSFT", &[100.0, 90.0]),
        ]));
        let f = fetcher(&provider);
        f.fetch_delta(&watchlist(&[("Apple", "AAPL"), ("Microsoft", "MSFT")]), 7).await;
        f.fetch_delta(&watchlist(&[("Microsoft", "MSFT"), ("Apple", "AAPL")]), 7).await;
        assert_eq!(provider.download_calls.load(Ordering::SeqCst), 1);

        f.fetch_delta(&watchlist(&[("Apple", "AAPL"), ("Microsoft", "MSFT")]), 30).await;
        assert_eq!(provider.download_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delta_upstream_failure_is_empty_and_not_cached() {
        let provider = Arc::new(MockProvider { fail_download: true, ..Default::default() });
        let f = fetcher(&provider);
        let symbols = watchlist(&[("Apple", "AAPL")]);

        assert!(f.fetch_delta(&symbols, 7).await.is_empty());
        assert!(f.fetch_delta(&symbols, 7).await.is_empty());
        assert_eq!(provider.download_calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.health().snapshot().upstream_failures, 2);
    }

    #[tokio::test]
    async fn delta_with_no_data_at_all_is_empty() {
        let provider = Arc::new(MockProvider::default());
        let f = fetcher(&provider);
        assert!(f.fetch_delta(&watchlist(&[("Apple", "AAPL")]), 7).await.is_empty());
        assert_eq!(f.cached_entries(), 0);
        assert_eq!(f.health().snapshot().no_data, 1);
    }

    #[tokio::test]
    async fn delta_invalid_input_skips_upstream() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[("AAPL", &[1.0, 2.0])]));
        let f = fetcher(&provider);
        assert!(f.fetch_delta(&[], 7).await.is_empty());
        assert!(f.fetch_delta(&watchlist(&[("Apple", "AAPL")]), 0).await.is_empty());
        assert_eq!(provider.download_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delta_skips_series_starting_at_zero() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[
            ("ZERO", &[0.0, 5.0]),
            ("AAPL", &[100.0, 110.0]),
        ]));
        let rows = fetcher(&provider)
            .fetch_delta(&watchlist(&[("Zero", "ZERO"), ("Apple", "AAPL")]), 7)
            .await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "AAPL");
    }

    // --- moving averages ---

    #[tokio::test]
    async fn moving_averages_over_short_series() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[("AAPL", &[10.0, 20.0, 30.0])]));
        let result = fetcher(&provider).fetch_moving_averages("AAPL", 365).await.unwrap();

        let ma50: Vec<f64> = result.history.iter().map(|p| p.ma_50).collect();
        let ma200: Vec<f64> = result.history.iter().map(|p| p.ma_200).collect();
        assert_eq!(ma50, vec![10.0, 15.0, 20.0]);
        assert_eq!(ma200, vec![10.0, 15.0, 20.0]);
        assert_eq!(result.current_price, 30.0);
        assert_eq!(result.prev_close, 20.0);
        assert_eq!(result.ma_50, 20.0);
        assert_eq!(result.period_high, 31.0);
        assert_eq!(result.period_low, 9.0);
        assert_eq!(result.history.len(), 3);
    }

    #[tokio::test]
    async fn moving_averages_single_point_prev_close_is_current() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[("AAPL", &[42.0])]));
        let result = fetcher(&provider).fetch_moving_averages("AAPL", 5).await.unwrap();
        assert_eq!(result.prev_close, 42.0);
        assert_eq!(result.current_price, 42.0);
    }

    #[tokio::test]
    async fn moving_averages_windows_diverge_after_fifty_points() {
        let closes: Vec<f64> = (1..=250).map(f64::from).collect();
        let provider = Arc::new(MockProvider::with_adj_closes(&[("SPY", &closes)]));
        let result = fetcher(&provider).fetch_moving_averages("SPY", 400).await.unwrap();
        // last 50 of 1..=250 -> mean of 201..=250; last 200 -> mean of 51..=250
        assert!((result.ma_50 - 225.5).abs() < 1e-9);
        assert!((result.ma_200 - 150.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn period_high_low_use_high_and_low_columns() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bar = |i: u64, h: f64, l: f64, c: f64| DailyBar {
            date: d + Days::new(i),
            open: c,
            high: h,
            low: l,
            close: c,
            adj_close: c,
        };
        let bars = vec![bar(0, 12.0, 8.0, 10.0), bar(1, 25.0, 11.0, 20.0), bar(2, 18.0, 3.0, 15.0)];
        let provider = Arc::new(MockProvider::with_bars("XYZ", bars));
        let result = fetcher(&provider).fetch_moving_averages("XYZ", 30).await.unwrap();
        assert_eq!(result.period_high, 25.0);
        assert_eq!(result.period_low, 3.0);
    }

    #[tokio::test]
    async fn unrecognized_symbol_skips_history() {
        let provider = Arc::new(MockProvider {
            unrecognized: vec!["NOPE".into()],
            ..MockProvider::with_adj_closes(&[("NOPE", &[1.0, 2.0])])
        });
        let f = fetcher(&provider);
        assert!(f.fetch_moving_averages("NOPE", 365).await.is_none());
        assert_eq!(provider.profile_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_profile_lookup_skips_history() {
        let provider = Arc::new(MockProvider {
            fail_profile: true,
            ..MockProvider::with_adj_closes(&[("AAPL", &[1.0, 2.0])])
        });
        let f = fetcher(&provider);
        assert!(f.fetch_moving_averages("AAPL", 365).await.is_none());
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.health().snapshot().no_data, 1);
    }

    #[tokio::test]
    async fn empty_history_is_absent() {
        let provider = Arc::new(MockProvider::default());
        assert!(fetcher(&provider).fetch_moving_averages("AAPL", 365).await.is_none());
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_failure_is_absent() {
        let provider = Arc::new(MockProvider {
            fail_history: true,
            ..MockProvider::with_adj_closes(&[("AAPL", &[1.0, 2.0])])
        });
        let f = fetcher(&provider);
        assert!(f.fetch_moving_averages("AAPL", 365).await.is_none());
        assert_eq!(f.health().snapshot().upstream_failures, 1);
    }

    #[tokio::test]
    async fn moving_averages_cached_until_ttl() {
        let provider = Arc::new(MockProvider::with_adj_closes(&[("AAPL", &[10.0, 20.0])]));
        let clock = ManualClock::new();
        let f = StockDataFetcher::with_clock(provider.clone(), Duration::from_secs(300), clock.clone());

        let a = f.fetch_moving_averages("AAPL", 365).await.unwrap();
        let b = f.fetch_moving_averages(" AAPL ", 365).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(300));
        f.fetch_moving_averages("AAPL", 365).await.unwrap();
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.cached_entries(), 1);
    }

    #[tokio::test]
    async fn blank_symbol_is_absent_without_calls() {
        let provider = Arc::new(MockProvider::default());
        let f = fetcher(&provider);
        assert!(f.fetch_moving_averages("  ", 365).await.is_none());
        assert!(f.fetch_moving_averages("AAPL", 0).await.is_none());
        assert_eq!(provider.profile_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cache_keys() {
        let a = watchlist(&[("Apple", "AAPL"), ("S&P 500", "^GSPC")]);
        let b = watchlist(&[("S&P 500", "^GSPC"), ("Apple", "AAPL")]);
        assert_eq!(delta_cache_key(&a, 7), delta_cache_key(&b, 7));
        assert_ne!(delta_cache_key(&a, 7), delta_cache_key(&a, 8));
        assert_eq!(ma_cache_key("AAPL", 365), "ma_AAPL_365");
    }
}
