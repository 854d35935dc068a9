#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use weatherman_actions::{ActionsError, WorkflowProvider};
use weatherman_api::config::ServerConfig;
use weatherman_api::router::build_app_router;
use weatherman_api::state::AppState;
use weatherman_core::run_match::WorkflowRun;
use weatherman_core::run_request::WorkflowInputs;

/// Token configured in [`test_config`].
pub const TEST_TOKEN: &str = "test-token";

/// In-memory provider that records every call it receives.
#[derive(Default)]
pub struct FakeProvider {
    /// `(repo, inputs)` of each dispatch call.
    pub dispatches: Mutex<Vec<(String, WorkflowInputs)>>,
    /// Repo of each run listing call.
    pub listings: Mutex<Vec<String>>,
    /// Runs returned from listings.
    pub runs: Vec<WorkflowRun>,
    /// When set, every call fails with this provider status and body.
    pub failure: Option<(u16, String)>,
}

impl FakeProvider {
    pub fn with_runs(runs: Vec<WorkflowRun>) -> Self {
        Self {
            runs,
            ..Self::default()
        }
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            failure: Some((status, body.to_string())),
            ..Self::default()
        }
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches.lock().unwrap().len()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.lock().unwrap().len()
    }

    pub fn last_dispatch(&self) -> (String, WorkflowInputs) {
        self.dispatches
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("a dispatch call should have been recorded")
    }

    fn fail(&self) -> Result<(), ActionsError> {
        match &self.failure {
            Some((status, body)) => Err(ActionsError::Api {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WorkflowProvider for FakeProvider {
    async fn dispatch_workflow(
        &self,
        repo: &str,
        inputs: &WorkflowInputs,
    ) -> Result<(), ActionsError> {
        self.dispatches
            .lock()
            .unwrap()
            .push((repo.to_string(), inputs.clone()));
        self.fail()
    }

    async fn list_recent_runs(&self, repo: &str) -> Result<Vec<WorkflowRun>, ActionsError> {
        self.listings.lock().unwrap().push(repo.to_string());
        self.fail()?;
        Ok(self.runs.clone())
    }
}

/// Build a test `ServerConfig`: environment defaults plus a token.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::from_lookup(|_| None).expect("defaults are valid");
    config.github_token = Some(TEST_TOKEN.to_string());
    config
}

/// Build the full application router (same middleware stack as production)
/// around the given provider.
pub fn build_test_app(config: ServerConfig, provider: Arc<FakeProvider>) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        provider,
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, &body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn options(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("OPTIONS")
        .uri(uri)
        .header("Origin", "https://forecasts.example.com")
        .header("Access-Control-Request-Method", "POST")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
