use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use weatherman_actions::ActionsError;
use weatherman_core::error::CoreError;

/// Message returned when the provider token is not configured.
pub const MISSING_TOKEN_MESSAGE: &str = "Missing server secret GITHUB_TOKEN";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for request rejections and [`ActionsError`] for
/// provider failures, and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce consistent `{ "error", "code" }` bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A request rejected by `weatherman_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The provider call failed.
    #[error(transparent)]
    Provider(#[from] ActionsError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The deployment is missing required configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
                }
            },

            // --- Provider errors ---
            AppError::Provider(err) => classify_provider_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Server misconfigured");
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                let message = if msg.is_empty() {
                    "Unknown error".to_string()
                } else {
                    msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Render a caught handler panic as an [`AppError::InternalError`] body.
///
/// Used with `CatchPanicLayer::custom`; the panic payload becomes the message
/// when it is a string.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        String::new()
    };
    AppError::InternalError(message).into_response()
}

/// Classify a provider error into an HTTP status, error code, and message.
///
/// - Non-2xx provider responses map to 502 with the provider's status and
///   body text embedded verbatim.
/// - Transport failures never reached the provider and map to 500.
fn classify_provider_error(err: &ActionsError) -> (StatusCode, &'static str, String) {
    match err {
        ActionsError::Api { status, .. } => {
            tracing::warn!(upstream_status = status, "Provider rejected request");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
        ActionsError::Request(inner) => {
            tracing::error!(error = %inner, "Provider request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
        }
    }
}
