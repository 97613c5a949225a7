use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "status": "error",
            "message": match &self {
                AppError::NotFound(msg) => msg.clone(),
                other => other.to_string(),
            },
        });
        (status, Json(body)).into_response()
    }
}

/// Failures inside a fetch operation. Never crosses the fetcher boundary:
/// every variant is logged and turned into an empty/absent result.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no data available")]
    NoDataAvailable,

    #[error("unrecognized symbol: {0}")]
    UnrecognizedSymbol(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Upstream(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

impl FetchError {
    /// Expected outcomes (nothing to show) as opposed to a broken provider.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            FetchError::NoDataAvailable
                | FetchError::UnrecognizedSymbol(_)
                | FetchError::InvalidRequest(_)
        )
    }
}
