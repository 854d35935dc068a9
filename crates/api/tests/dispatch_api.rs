//! Integration tests for `POST /api/dispatch`.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{body_json, build_test_app, options, post_json, post_raw, test_config, FakeProvider};
use weatherman_core::run_request::{DispatchMode, SeriesShape, DEFAULT_REPO};
use weatherman_core::slug::SlugZone;

fn is_timestamped_slug(slug: &str, name: &str) -> bool {
    let bytes = slug.as_bytes();
    slug.len() == 16 + name.len()
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'-'
        && bytes[9..15].iter().all(u8::is_ascii_digit)
        && bytes[15] == b'-'
        && slug.ends_with(name)
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_returns_slug_and_forwards_inputs() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({
            "run_name_root": "My Forecast!",
            "payload": { "series_name": "sales", "horizon": 14 },
            "backtest_windows": 5
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["message"], "Workflow dispatched");
    let slug = body["slug"].as_str().unwrap().to_string();
    assert!(is_timestamped_slug(&slug, "my-forecast"), "unexpected slug {slug}");

    assert_eq!(provider.dispatch_count(), 1);
    let (repo, inputs) = provider.last_dispatch();
    assert_eq!(repo, DEFAULT_REPO);
    assert_eq!(inputs.slug, slug);
    assert_eq!(inputs.use_m5, "false");
    assert_eq!(inputs.m5_series_count, "3");
    assert_eq!(inputs.backtest_windows, "5");

    let payload: Value = serde_json::from_str(&inputs.payload).unwrap();
    assert_eq!(payload, json!({ "series_name": "sales", "horizon": 14 }));
}

#[tokio::test]
async fn run_name_root_is_read_from_payload_string() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({
            "payload": "{\"run_name_root\":\"weekly\",\"n_series\":7}",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let (_, inputs) = provider.last_dispatch();
    assert!(inputs.slug.ends_with("-weekly"));
    assert_eq!(inputs.m5_series_count, "7");
    assert_eq!(inputs.backtest_windows, "3");
}

#[tokio::test]
async fn demo_mode_overwrites_series_name() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({
            "run_name_root": "demo",
            "use_m5": true,
            "m5_series_count": "10",
            "payload": { "series_name": "sales" }
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let (_, inputs) = provider.last_dispatch();
    assert_eq!(inputs.use_m5, "true");
    assert_eq!(inputs.m5_series_count, "10");
    let payload: Value = serde_json::from_str(&inputs.payload).unwrap();
    assert_eq!(payload["series_name"], "demo_mode_m5");
}

#[tokio::test]
async fn pass_through_mode_forwards_caller_slug() {
    let provider = Arc::new(FakeProvider::default());
    let mut config = test_config();
    config.dispatch.mode = DispatchMode::PassThrough;
    let app = build_test_app(config, provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({
            "slug": "20240115-093000-from-client",
            "payload": "{\"anything\":true}",
            "use_m5": true
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["slug"], "20240115-093000-from-client");

    let (_, inputs) = provider.last_dispatch();
    assert_eq!(inputs.slug, "20240115-093000-from-client");
    assert_eq!(inputs.payload, "{\"anything\":true}");
    assert_eq!(inputs.use_m5, "true");
}

#[tokio::test]
async fn civil_zone_slug_carries_zone_abbreviation() {
    let provider = Arc::new(FakeProvider::default());
    let mut config = test_config();
    config.dispatch.slug_zone = SlugZone::civil("America/Denver").unwrap();
    let app = build_test_app(config, provider.clone());

    let response = post_json(app, "/api/dispatch", json!({ "run_name_root": "Denver" })).await;

    assert_eq!(response.status(), StatusCode::OK);
    let (_, inputs) = provider.last_dispatch();
    let zone = &inputs.slug[16..19];
    assert!(zone == "mst" || zone == "mdt", "unexpected slug {}", inputs.slug);
    assert!(inputs.slug.ends_with("-denver"));
}

// ---------------------------------------------------------------------------
// Response links
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_includes_links_by_default() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider);

    let response = post_json(app, "/api/dispatch", json!({ "run_name_root": "links" })).await;

    let body = body_json(response).await;
    let slug = body["slug"].as_str().unwrap();
    assert_eq!(
        body["actions_url"],
        "https://github.com/bryanwhiting/weatherman/actions/workflows/forecast-request.yml"
    );
    assert_eq!(body["status_url"], format!("/api/run-status?slug={slug}"));
}

#[tokio::test]
async fn response_links_can_be_disabled() {
    let provider = Arc::new(FakeProvider::default());
    let mut config = test_config();
    config.response_links = false;
    let app = build_test_app(config, provider);

    let response = post_json(app, "/api/dispatch", json!({ "run_name_root": "links" })).await;

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert!(body.get("actions_url").is_none());
    assert!(body.get("status_url").is_none());
}

// ---------------------------------------------------------------------------
// Rejections: none of these may reach the provider
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_returns_500_without_dispatching() {
    let provider = Arc::new(FakeProvider::default());
    let mut config = test_config();
    config.github_token = None;
    let app = build_test_app(config, provider.clone());

    let response = post_json(app, "/api/dispatch", json!({ "run_name_root": "x" })).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing server secret GITHUB_TOKEN");
    assert_eq!(provider.dispatch_count(), 0);
}

#[tokio::test]
async fn other_repo_is_forbidden() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({ "repo": "someone/else", "run_name_root": "x" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Repo not allowed. Expected bryanwhiting/weatherman");
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(provider.dispatch_count(), 0);
}

#[tokio::test]
async fn missing_run_name_root_is_rejected() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({ "run_name_root": "   ", "payload": { "series_name": "sales" } }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "payload.run_name_root is required");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(provider.dispatch_count(), 0);
}

#[tokio::test]
async fn reserved_series_name_is_rejected_outside_demo_mode() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({
            "run_name_root": "x",
            "use_m5": false,
            "payload": { "series_name": "demo_mode_m5" }
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.dispatch_count(), 0);
}

#[tokio::test]
async fn multi_series_length_mismatch_is_rejected() {
    let provider = Arc::new(FakeProvider::default());
    let mut config = test_config();
    config.dispatch.series_shape = SeriesShape::Multi;
    let app = build_test_app(config, provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({
            "run_name_root": "x",
            "payload": {
                "series_names": ["a", "b"],
                "series_data": [[1, 2, 3]]
            }
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.dispatch_count(), 0);
}

#[tokio::test]
async fn pass_through_without_slug_is_rejected() {
    let provider = Arc::new(FakeProvider::default());
    let mut config = test_config();
    config.dispatch.mode = DispatchMode::PassThrough;
    let app = build_test_app(config, provider.clone());

    let response = post_json(app, "/api/dispatch", json!({ "run_name_root": "x" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "slug is required");
    assert_eq!(provider.dispatch_count(), 0);
}

#[tokio::test]
async fn malformed_json_returns_json_400() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_raw(app, "/api/dispatch", "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));
    assert_eq!(provider.dispatch_count(), 0);
}

#[tokio::test]
async fn invalid_payload_string_is_rejected() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(
        app,
        "/api/dispatch",
        json!({ "run_name_root": "x", "payload": "{broken" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(provider.dispatch_count(), 0);
}

// ---------------------------------------------------------------------------
// Provider failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_rejection_returns_502_with_upstream_details() {
    let provider = Arc::new(FakeProvider::failing(
        422,
        "{\"message\":\"Unexpected inputs provided\"}",
    ));
    let app = build_test_app(test_config(), provider.clone());

    let response = post_json(app, "/api/dispatch", json!({ "run_name_root": "x" })).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("422"), "message was {message}");
    assert!(message.contains("Unexpected inputs provided"), "message was {message}");
    assert_eq!(provider.dispatch_count(), 1);
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_carry_cors_headers() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider);

    let response = post_json(app, "/api/dispatch", json!({ "repo": "nope/nope" })).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-headers"], "content-type");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
}

#[tokio::test]
async fn preflight_returns_204_without_dispatching() {
    let provider = Arc::new(FakeProvider::default());
    let app = build_test_app(test_config(), provider.clone());

    let response = options(app, "/api/dispatch").await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(response.headers()["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(provider.dispatch_count(), 0);
}
