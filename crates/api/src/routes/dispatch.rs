use axum::http::header::ACCESS_CONTROL_ALLOW_METHODS;
use axum::http::HeaderValue;
use axum::routing::post;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handlers::{self, dispatch};
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST    /dispatch   -> dispatch_run
/// OPTIONS /dispatch   -> preflight
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/dispatch",
            post(dispatch::dispatch_run).options(handlers::preflight),
        )
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
}
