use crate::error::{AppError, Result};
use crate::types::TrackedSymbol;

pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Browser-like user agent; the chart endpoint rejects bare clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Cached responses are served for this many seconds.
pub const CACHE_TTL_SECS: u64 = 300;

/// Upstream request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_DELTA_DAYS: u32 = 7;
pub const DEFAULT_MA_DAYS: u32 = 365;
pub const DEFAULT_MA_SYMBOL: &str = "AAPL";

/// Moving-average window lengths (trading days).
pub const MA_SHORT_WINDOW: usize = 50;
pub const MA_LONG_WINDOW: usize = 200;

/// Built-in watchlist: (display name, ticker). Order is display order.
pub const DEFAULT_WATCHLIST: &[(&str, &str)] = &[
    ("NASDAQ", "^IXIC"),
    ("S&P 500", "^GSPC"),
    ("Dow Jones", "^DJI"),
    ("Apple", "AAPL"),
    ("Microsoft", "MSFT"),
    ("Amazon", "AMZN"),
    ("Google", "GOOGL"),
    ("Tesla", "TSLA"),
    ("Nvidia", "NVDA"),
    ("Meta", "META"),
];

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_host: String,
    pub api_port: u16,
    pub log_level: String,
    pub yahoo_chart_url: String,
    pub cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub default_delta_days: u32,
    pub default_ma_days: u32,
    /// Symbols shown on the dashboard (WATCHLIST, `Name=TICKER` comma-separated).
    /// Example: "Apple=AAPL,Bitcoin=BTC-USD"
    pub watchlist: Vec<TrackedSymbol>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let watchlist = match get("WATCHLIST") {
            Some(raw) if !raw.trim().is_empty() => parse_watchlist(&raw)?,
            _ => default_watchlist(),
        };

        Ok(Self {
            bind_host: get("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_var(&get, "API_PORT", 5000)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            yahoo_chart_url: get("YAHOO_CHART_URL")
                .unwrap_or_else(|| YAHOO_CHART_URL.to_string()),
            cache_ttl_secs: parse_var(&get, "CACHE_TTL_SECS", CACHE_TTL_SECS)?,
            http_timeout_secs: parse_var(&get, "HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?,
            default_delta_days: parse_days(&get, "DEFAULT_DELTA_DAYS", DEFAULT_DELTA_DAYS)?,
            default_ma_days: parse_days(&get, "DEFAULT_MA_DAYS", DEFAULT_MA_DAYS)?,
            watchlist,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        None => Ok(default),
    }
}

fn parse_days(get: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> Result<u32> {
    let days = parse_var(get, key, default)?;
    if days == 0 {
        return Err(AppError::Config(format!("{key} must be a positive number of days")));
    }
    Ok(days)
}

pub fn default_watchlist() -> Vec<TrackedSymbol> {
    DEFAULT_WATCHLIST
        .iter()
        .map(|(name, ticker)| TrackedSymbol::new(*name, *ticker))
        .collect()
}

/// Parse `Name=TICKER,Name=TICKER`. Entries without `=` use the ticker as the name.
pub fn parse_watchlist(raw: &str) -> Result<Vec<TrackedSymbol>> {
    let mut out = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, ticker) = match entry.split_once('=') {
            Some((n, t)) => (n.trim(), t.trim()),
            None => (entry, entry),
        };
        if name.is_empty() || ticker.is_empty() {
            return Err(AppError::Config(format!("WATCHLIST entry {entry:?} is incomplete")));
        }
        out.push(TrackedSymbol::new(name, ticker));
    }
    if out.is_empty() {
        return Err(AppError::Config("WATCHLIST has no entries".to_string()));
    }
    Ok(out)
}
