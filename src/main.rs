mod api;
mod config;
mod error;
mod fetcher;
mod indicators;
mod provider;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::StockDataFetcher;
use crate::provider::YahooProvider;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Upstream provider + fetcher (owns the response cache) ---
    let provider = YahooProvider::new(&cfg)?;
    let fetcher = Arc::new(StockDataFetcher::new(
        Arc::new(provider),
        Duration::from_secs(cfg.cache_ttl_secs),
    ));
    info!(
        "Fetcher ready: upstream={} cache_ttl={}s timeout={}s",
        cfg.yahoo_chart_url, cfg.cache_ttl_secs, cfg.http_timeout_secs,
    );

    let tickers: Vec<&str> = cfg.watchlist.iter().map(|s| s.ticker.as_str()).collect();
    info!("Watchlist ({}): {}", tickers.len(), tickers.join(", "));

    // --- HTTP API server ---
    let api_state = ApiState {
        fetcher,
        watchlist: Arc::new(cfg.watchlist.clone()),
        default_delta_days: cfg.default_delta_days,
        default_ma_days: cfg.default_ma_days,
    };
    let app = router(api_state);
    let bind_addr = format!("{}:{}", cfg.bind_host, cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
