//! Handler for polling the provider run that belongs to a slug.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use weatherman_core::run_match::{RunMatcher, WorkflowRun};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::require_token;

/// Status reported while no matching run is visible yet.
pub const NOT_FOUND_STATUS: &str = "not_found";

#[derive(Debug, Deserialize)]
pub struct RunStatusQuery {
    #[serde(default)]
    pub slug: Option<String>,
}

/// Poll result. Run fields are only present when a run was found.
///
/// `status` is `not_found` when nothing matched, otherwise the provider's
/// value as sent (possibly `null`).
#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    pub found: bool,
    pub slug: String,
    pub status: Option<String>,
    #[serde(flatten)]
    pub run: Option<RunDetails>,
}

/// Provider run fields, passed through verbatim.
#[derive(Debug, Serialize)]
pub struct RunDetails {
    pub id: Option<u64>,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl RunStatusResponse {
    fn not_found(slug: String) -> Self {
        Self {
            found: false,
            slug,
            status: Some(NOT_FOUND_STATUS.to_string()),
            run: None,
        }
    }

    fn found(slug: String, run: &WorkflowRun) -> Self {
        Self {
            found: true,
            slug,
            status: run.status.clone(),
            run: Some(RunDetails {
                id: run.id,
                conclusion: run.conclusion.clone(),
                html_url: run.html_url.clone(),
                created_at: run.created_at.clone(),
                updated_at: run.updated_at.clone(),
            }),
        }
    }
}

/// GET /api/run-status?slug=
///
/// A run that is not visible yet is a normal `200` with `found: false`;
/// the provider lists new runs with some delay after a dispatch.
pub async fn get_run_status(
    State(state): State<AppState>,
    query: Result<Query<RunStatusQuery>, QueryRejection>,
) -> AppResult<Json<RunStatusResponse>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let slug = query
        .slug
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("slug is required".to_string()))?
        .to_string();

    let config = &state.config;
    require_token(config)?;

    let runs = state.provider.list_recent_runs(&config.allowed_repo).await?;

    let matcher = RunMatcher {
        slug: &slug,
        workflow_name: &config.github.workflow_name,
        mode: config.run_match,
    };

    let response = match matcher.find(&runs) {
        Some(run) => {
            tracing::debug!(%slug, run_id = ?run.id, status = ?run.status, "Matched workflow run");
            RunStatusResponse::found(slug.clone(), run)
        }
        None => {
            tracing::debug!(%slug, scanned = runs.len(), "No matching workflow run yet");
            RunStatusResponse::not_found(slug.clone())
        }
    };

    Ok(Json(response))
}
