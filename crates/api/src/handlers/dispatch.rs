//! Handler for triggering a forecast workflow run.
//!
//! The handler checks the deployment, normalizes the request through
//! [`RunRequest::plan`] and then makes exactly one dispatch call to the
//! provider. Every rejection happens before that call.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use reqwest::Url;
use serde::Serialize;
use weatherman_core::run_request::{DispatchPlan, RunRequest};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::require_token;

/// Path of the status endpoint, used to build `status_url`.
const STATUS_PATH: &str = "/api/run-status";

/// Successful dispatch acknowledgement.
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub ok: bool,
    pub message: &'static str,
    pub slug: String,
    /// Provider page listing runs of the workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions_url: Option<String>,
    /// Ready-to-poll status endpoint for this slug.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
}

/// POST /api/dispatch
///
/// The body is read as raw bytes so a missing or wrong `content-type` does
/// not matter and malformed JSON still produces a JSON error body.
pub async fn dispatch_run(State(state): State<AppState>, body: Bytes) -> AppResult<Json<DispatchResponse>> {
    let config = &state.config;
    require_token(config)?;

    let request: RunRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?;

    let plan = request.plan(&config.allowed_repo, &config.dispatch, Utc::now())?;

    state
        .provider
        .dispatch_workflow(&plan.repo, &plan.inputs)
        .await?;

    tracing::info!(
        repo = %plan.repo,
        slug = %plan.slug(),
        use_m5 = %plan.inputs.use_m5,
        "Workflow dispatched"
    );

    let (actions_url, status_url) = if config.response_links {
        (Some(actions_url(config, &plan)), Some(status_url(plan.slug())?))
    } else {
        (None, None)
    };

    Ok(Json(DispatchResponse {
        ok: true,
        message: "Workflow dispatched",
        slug: plan.inputs.slug,
        actions_url,
        status_url,
    }))
}

fn actions_url(config: &ServerConfig, plan: &DispatchPlan) -> String {
    format!(
        "{}/{}/actions/workflows/{}",
        config.github.web_url.trim_end_matches('/'),
        plan.repo,
        config.github.workflow_file
    )
}

/// Relative URL of the status endpoint with the slug query-encoded.
fn status_url(slug: &str) -> AppResult<String> {
    // Any absolute base works; only the path and query are kept.
    let url = Url::parse_with_params(&format!("http://localhost{STATUS_PATH}"), &[("slug", slug)])
        .map_err(|e| AppError::InternalError(format!("failed to build status URL: {e}")))?;
    Ok(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
}
