use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSymbol {
    /// Display name, e.g. "S&P 500".
    pub name: String,
    /// Upstream ticker, e.g. "^GSPC".
    #[serde(rename = "symbol")]
    pub ticker: String,
}

impl TrackedSymbol {
    pub fn new(name: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self { name: name.into(), ticker: ticker.into() }
    }
}

// ---------------------------------------------------------------------------
// Normalized upstream records
// ---------------------------------------------------------------------------

/// One daily OHLC bar. `adj_close` equals `close` when the provider has no
/// adjusted series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
}

/// Instrument metadata. A symbol counts as tradeable only when the provider
/// reports its exchange timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolProfile {
    pub symbol: String,
    pub timezone: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

impl SymbolProfile {
    pub fn is_recognized(&self) -> bool {
        self.timezone.as_deref().is_some_and(|tz| !tz.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Fetch results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRow {
    pub symbol: String,
    pub name: String,
    /// Percent change of adjusted close over the window, 2 decimals.
    pub delta_percent: f64,
    /// Latest adjusted close, 2 decimals.
    pub last_price: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub ma_50: f64,
    pub ma_200: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageResult {
    pub symbol: String,
    pub current_price: f64,
    pub prev_close: f64,
    pub period_high: f64,
    pub period_low: f64,
    pub ma_50: f64,
    pub ma_200: f64,
    pub history: Vec<HistoryPoint>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Round to two decimal places, half away from zero.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
