//! Yahoo Finance chart API (`/v8/finance/chart/{ticker}`).
//! One request per ticker; a batched download fans out concurrently.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use futures_util::future::join_all;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Config, USER_AGENT};
use crate::error::{AppError, FetchError, Result};
use crate::provider::MarketDataProvider;
use crate::types::{DailyBar, SymbolProfile};

const SECS_PER_DAY: i64 = 86_400;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    exchange_timezone_name: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
    adjclose: Option<Vec<AdjCloseColumn>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseColumn {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Normalized chart payload for one ticker.
#[derive(Debug)]
struct ChartSeries {
    profile: SymbolProfile,
    bars: Vec<DailyBar>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl YahooProvider {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        let base_url = Url::parse(&cfg.yahoo_chart_url)
            .map_err(|e| AppError::Config(format!("YAHOO_CHART_URL is not a valid URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "YAHOO_CHART_URL cannot carry a ticker path: {base_url}"
            )));
        }
        Ok(Self { client, base_url })
    }

    /// `GET {base}/{ticker}?period1=..&period2=..&interval=1d&...`; the ticker
    /// is pushed as one path segment so `^GSPC` or `BRK/B` stay intact.
    fn chart_request(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<reqwest::Request, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidRequest(format!("base URL {} has no path", self.base_url)))?
            .pop_if_empty()
            .push(ticker);

        let (period1, period2) = period_bounds(start, end);
        let request = self
            .client
            .get(url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,split".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .build()?;
        Ok(request)
    }

    async fn fetch_chart(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<ChartSeries, FetchError> {
        let request = self.chart_request(ticker, start, end)?;
        debug!(ticker, url = %request.url(), "chart request");

        let resp = self.client.execute(request).await?;
        let status = resp.status();
        let body = resp.text().await?;
        decode_response(status, &body, ticker)
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    async fn download(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<HashMap<String, Vec<DailyBar>>, FetchError> {
        let requests = tickers.iter().map(|t| async move {
            (t.clone(), self.fetch_chart(t, start, end).await)
        });
        merge_batch(join_all(requests).await)
    }

    async fn profile(&self, ticker: &str) -> std::result::Result<SymbolProfile, FetchError> {
        // The chart meta block carries the exchange timezone; a short range keeps it cheap.
        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Days::new(5);
        match self.fetch_chart(ticker, start, end).await {
            Ok(series) => Ok(series.profile),
            Err(FetchError::NoDataAvailable) => {
                Err(FetchError::UnrecognizedSymbol(ticker.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<DailyBar>, FetchError> {
        Ok(self.fetch_chart(ticker, start, end).await?.bars)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Yahoo answers unknown tickers with a 404 carrying a JSON error body, so the
/// body is decoded before the status is looked at. A non-2xx body that is not
/// chart JSON (proxy page, rate-limit text) is a provider failure.
fn decode_response(
    status: StatusCode,
    body: &str,
    ticker: &str,
) -> std::result::Result<ChartSeries, FetchError> {
    match parse_chart(body, ticker) {
        Err(FetchError::Malformed(e)) if !status.is_success() => {
            Err(FetchError::Upstream(format!("HTTP {status} for {ticker}: {e}")))
        }
        other => other,
    }
}

/// Fold per-ticker chart results into one batch. Tickers without bars are
/// dropped; the batch fails only when nothing arrived and at least one
/// request broke for a reason other than "no data".
fn merge_batch(
    responses: Vec<(String, std::result::Result<ChartSeries, FetchError>)>,
) -> std::result::Result<HashMap<String, Vec<DailyBar>>, FetchError> {
    let mut out = HashMap::with_capacity(responses.len());
    let mut first_failure = None;
    for (ticker, result) in responses {
        match result {
            Ok(series) if !series.bars.is_empty() => {
                out.insert(ticker, series.bars);
            }
            Ok(_) => debug!(ticker = %ticker, "no bars in range"),
            Err(e) if e.is_expected() => debug!(ticker = %ticker, "skipped: {e}"),
            Err(e) => {
                warn!(ticker = %ticker, "chart request failed: {e}");
                first_failure.get_or_insert(e);
            }
        }
    }

    match first_failure {
        Some(e) if out.is_empty() => Err(e),
        _ => Ok(out),
    }
}

fn parse_chart(body: &str, ticker: &str) -> std::result::Result<ChartSeries, FetchError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        return if err.code.eq_ignore_ascii_case("Not Found") {
            Err(FetchError::NoDataAvailable)
        } else {
            Err(FetchError::Upstream(format!("{}: {}", err.code, err.description)))
        };
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or(FetchError::NoDataAvailable)?;

    let meta = result.meta;
    let profile = SymbolProfile {
        symbol: meta.symbol.unwrap_or_else(|| ticker.to_string()),
        timezone: meta.exchange_timezone_name,
        exchange: meta.exchange_name,
        currency: meta.currency,
    };

    let Some(indicators) = result.indicators else {
        return Ok(ChartSeries { profile, bars: Vec::new() });
    };
    let quote = indicators.quote.into_iter().next().unwrap_or_default();
    let adj = indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let column = |col: &[Option<f64>], i: usize| col.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        // Rows with holes are holidays/halts as far as the chart is concerned.
        let (Some(open), Some(high), Some(low), Some(close)) = (
            column(&quote.open, i),
            column(&quote.high, i),
            column(&quote.low, i),
            column(&quote.close, i),
        ) else {
            continue;
        };
        let Some(date) = DateTime::from_timestamp(ts + meta.gmtoffset, 0).map(|d| d.date_naive())
        else {
            continue;
        };
        bars.push(DailyBar {
            date,
            open,
            high,
            low,
            close,
            adj_close: column(&adj, i).unwrap_or(close),
        });
    }

    Ok(ChartSeries { profile, bars })
}

/// Unix seconds for `[start 00:00 UTC, end + 1 day 00:00 UTC)`, so `end` is inclusive.
fn period_bounds(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
    let midnight = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default()
    };
    (midnight(start), midnight(end) + SECS_PER_DAY)
}
