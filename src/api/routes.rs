use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthSnapshot;
use crate::config::DEFAULT_MA_SYMBOL;
use crate::error::AppError;
use crate::fetcher::StockDataFetcher;
use crate::types::{DeltaRow, MovingAverageResult, TrackedSymbol};

#[derive(Clone)]
pub struct ApiState {
    pub fetcher: Arc<StockDataFetcher>,
    pub watchlist: Arc<Vec<TrackedSymbol>>,
    pub default_delta_days: u32,
    pub default_ma_days: u32,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(get_watchlist))
        .route("/delta", get(get_delta))
        .route("/moving_avg", get(get_moving_avg))
        .route("/get_stock_data", get(get_stock_data))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

// `days` arrives as a raw string so a malformed value falls back to the
// default instead of rejecting the request.

#[derive(Deserialize)]
pub struct DeltaQuery {
    pub days: Option<String>,
}

#[derive(Deserialize)]
pub struct SymbolQuery {
    pub symbol: Option<String>,
    pub days: Option<String>,
}

fn days_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct DeltaResponse {
    pub days: u32,
    pub rows: Vec<DeltaRow>,
}

#[derive(Serialize)]
pub struct MovingAvgResponse {
    pub days: u32,
    #[serde(flatten)]
    pub result: MovingAverageResult,
    pub available_stocks: Vec<TrackedSymbol>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_entries: usize,
    pub cache_ttl_secs: u64,
    #[serde(flatten)]
    pub counters: HealthSnapshot,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_watchlist(State(state): State<ApiState>) -> Json<Vec<TrackedSymbol>> {
    Json(state.watchlist.as_ref().clone())
}

async fn get_delta(
    State(state): State<ApiState>,
    Query(params): Query<DeltaQuery>,
) -> Result<Json<DeltaResponse>, AppError> {
    let days = days_or(params.days.as_deref(), state.default_delta_days);
    let rows = state.fetcher.fetch_delta(&state.watchlist, days).await;
    if rows.is_empty() {
        return Err(AppError::NotFound("no data available".to_string()));
    }
    Ok(Json(DeltaResponse { days, rows: rows.as_ref().clone() }))
}

async fn get_moving_avg(
    State(state): State<ApiState>,
    Query(params): Query<SymbolQuery>,
) -> Result<Json<MovingAvgResponse>, AppError> {
    let symbol = params.symbol.as_deref().unwrap_or(DEFAULT_MA_SYMBOL);
    let days = days_or(params.days.as_deref(), state.default_ma_days);

    let result = state
        .fetcher
        .fetch_moving_averages(symbol, days)
        .await
        .ok_or_else(|| AppError::NotFound("invalid stock symbol".to_string()))?;

    Ok(Json(MovingAvgResponse {
        days,
        result: result.as_ref().clone(),
        available_stocks: state.watchlist.as_ref().clone(),
    }))
}

/// Compact quote for client-side widgets. Always 200; failure is reported in
/// the body.
async fn get_stock_data(
    State(state): State<ApiState>,
    Query(params): Query<SymbolQuery>,
) -> Json<serde_json::Value> {
    let days = days_or(params.days.as_deref(), state.default_ma_days);
    let Some(symbol) = params.symbol.filter(|s| !s.trim().is_empty()) else {
        return Json(serde_json::json!({ "status": "error", "message": "symbol is required" }));
    };

    match state.fetcher.fetch_moving_averages(&symbol, days).await {
        Some(data) => Json(serde_json::json!({
            "status": "success",
            "data": {
                "symbol": data.symbol,
                "current_price": data.current_price,
                "ma_50": data.ma_50,
                "ma_200": data.ma_200,
            }
        })),
        None => Json(serde_json::json!({ "status": "error", "message": "No data found" })),
    }
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cache_entries: state.fetcher.cached_entries(),
        cache_ttl_secs: state.fetcher.cache_ttl().as_secs(),
        counters: state.fetcher.health().snapshot(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let latency = state.fetcher.latency();
    let (p50, p95, p99) = latency.percentiles();
    Json(serde_json::json!({
        "samples": latency.len(),
        "p50_ms": p50,
        "p95_ms": p95,
        "p99_ms": p99
    }))
}
