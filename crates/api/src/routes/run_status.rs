use axum::http::header::ACCESS_CONTROL_ALLOW_METHODS;
use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handlers::{self, run_status};
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// GET     /run-status?slug=   -> get_run_status
/// OPTIONS /run-status         -> preflight
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/run-status",
            get(run_status::get_run_status).options(handlers::preflight),
        )
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
}
