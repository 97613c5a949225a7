pub mod yahoo;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::FetchError;
use crate::types::{DailyBar, SymbolProfile};

pub use yahoo::YahooProvider;

/// Upstream market-data source. Implementations normalize their wire format
/// into [`DailyBar`] / [`SymbolProfile`] before returning.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars for several tickers over `[start, end]`, keyed by ticker.
    /// Tickers the provider has nothing for are absent from the map.
    async fn download(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Vec<DailyBar>>, FetchError>;

    /// Instrument metadata for one ticker.
    async fn profile(&self, ticker: &str) -> Result<SymbolProfile, FetchError>;

    /// Daily bars for one ticker over `[start, end]`, oldest first.
    async fn history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, FetchError>;
}
