pub mod dispatch;
pub mod run_status;

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult, MISSING_TOKEN_MESSAGE};

/// OPTIONS -- CORS preflight. CORS headers are added by the router layers.
pub async fn preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(CONTENT_TYPE, "application/json")])
}

/// Fail with a configuration error when no provider token is set.
fn require_token(config: &ServerConfig) -> AppResult<()> {
    match config.github_token {
        Some(_) => Ok(()),
        None => Err(AppError::Config(MISSING_TOKEN_MESSAGE.to_string())),
    }
}
