//! REST client for the GitHub Actions endpoints.
//!
//! Wraps the two calls the service needs (workflow dispatch and the run
//! listing) using [`reqwest`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use weatherman_core::run_match::WorkflowRun;
use weatherman_core::run_request::WorkflowInputs;

use crate::provider::WorkflowProvider;

/// Media type GitHub recommends for REST requests.
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Pinned REST API version header.
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// Where and how to reach the provider.
#[derive(Debug, Clone)]
pub struct ActionsConfig {
    /// REST base URL, e.g. `https://api.github.com`.
    pub api_url: String,
    /// Bearer token. Requests are sent unauthenticated when absent.
    pub token: Option<String>,
    /// `User-Agent` header value (GitHub rejects requests without one).
    pub user_agent: String,
    /// Workflow file dispatched under `.github/workflows/`.
    pub workflow_file: String,
    /// Git ref the workflow runs against.
    pub git_ref: String,
    /// Number of runs fetched per status poll.
    pub runs_page_size: u8,
}

/// HTTP client for the GitHub Actions API of one deployment.
pub struct GitHubActions {
    client: reqwest::Client,
    config: ActionsConfig,
}

/// Errors from the GitHub Actions REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ActionsError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// GitHub returned a non-2xx status code.
    #[error("GitHub API {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Response of `GET /repos/{repo}/actions/runs`.
#[derive(Debug, Deserialize)]
struct WorkflowRunsPage {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

impl GitHubActions {
    /// Create a new client with its own connection pool.
    pub fn new(config: ActionsConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ActionsConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ActionsConfig {
        &self.config
    }

    fn dispatch_url(&self, repo: &str) -> String {
        format!(
            "{}/repos/{repo}/actions/workflows/{}/dispatches",
            self.config.api_url.trim_end_matches('/'),
            self.config.workflow_file
        )
    }

    fn runs_url(&self, repo: &str) -> String {
        format!(
            "{}/repos/{repo}/actions/runs",
            self.config.api_url.trim_end_matches('/')
        )
    }

    /// Attach the headers every GitHub request carries.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header(ACCEPT, GITHUB_JSON)
            .header(USER_AGENT, &self.config.user_agent)
            .header(API_VERSION_HEADER, API_VERSION);
        match &self.config.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ActionsError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ActionsError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ActionsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl WorkflowProvider for GitHubActions {
    /// `POST /repos/{repo}/actions/workflows/{file}/dispatches`.
    ///
    /// GitHub answers `204 No Content` and does not return the run id.
    async fn dispatch_workflow(
        &self,
        repo: &str,
        inputs: &WorkflowInputs,
    ) -> Result<(), ActionsError> {
        let body = serde_json::json!({
            "ref": self.config.git_ref,
            "inputs": inputs,
        });

        let response = self
            .authorize(self.client.post(self.dispatch_url(repo)))
            .json(&body)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        tracing::debug!(repo, slug = %inputs.slug, "Workflow dispatch accepted");
        Ok(())
    }

    /// `GET /repos/{repo}/actions/runs?per_page=N`.
    async fn list_recent_runs(&self, repo: &str) -> Result<Vec<WorkflowRun>, ActionsError> {
        let response = self
            .authorize(self.client.get(self.runs_url(repo)))
            .query(&[("per_page", self.config.runs_page_size)])
            .send()
            .await?;

        let page: WorkflowRunsPage = Self::ensure_success(response).await?.json().await?;
        Ok(page.workflow_runs)
    }
}
