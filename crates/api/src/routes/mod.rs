pub mod dispatch;
pub mod health;
pub mod run_status;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /dispatch          POST   trigger a forecast run      (OPTIONS preflight)
/// /run-status        GET    poll a run by slug          (OPTIONS preflight)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(dispatch::router())
        .merge(run_status::router())
}
