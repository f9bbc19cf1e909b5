//! Integration tests for the vtel-live HTTP API

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{engine, settle, MockConnector};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`
use vtel_common::events::StreamKind;
use vtel_live::api::{build_router, AppState};

fn setup_app(connector: std::sync::Arc<MockConnector>) -> Router {
    build_router(AppState::new(engine(connector, 2)))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

fn start_request(session_id: &str) -> Value {
    json!({
        "session_id": session_id,
        "industry": "retail",
        "sub_industry": "store_analytics",
        "rule_id": "1",
        "source_label": "entrance"
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(MockConnector::new());
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "vtel-live");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn test_start_session_and_read_it_back() {
    let connector = MockConnector::new();
    let app = setup_app(connector.clone());

    let (status, body) = send(&app, post_json("/control/sessions", start_request("job-1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rule_name"], "Person Count");
    assert_eq!(body["created"], true);
    settle().await;
    assert_eq!(connector.connects("job-1", StreamKind::Results), 1);

    let (status, body) = send(&app, get("/api/sessions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"], json!(["job-1"]));
    assert_eq!(body["capacity"], 2);

    let (status, body) = send(&app, get("/api/sessions/job-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["descriptor"]["rule_name"], "Person Count");
    assert_eq!(body["descriptor"]["source_label"], "entrance");
    assert_eq!(body["series"][0]["name"], "Persons Count");
    assert_eq!(body["series"][0]["points"], json!([]));
    assert_eq!(body["completed"], false);
    assert_eq!(body["frame_axis_max"], 500);
}

#[tokio::test]
async fn test_repeated_start_is_not_created() {
    let app = setup_app(MockConnector::new());
    send(&app, post_json("/control/sessions", start_request("job-1"))).await;
    let (status, body) = send(&app, post_json("/control/sessions", start_request("job-1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
}

#[tokio::test]
async fn test_capacity_reported_on_start() {
    let app = setup_app(MockConnector::new());
    for id in ["a", "b"] {
        send(&app, post_json("/control/sessions", start_request(id))).await;
    }
    let (_, body) = send(&app, post_json("/control/sessions", start_request("c"))).await;
    assert_eq!(body["evicted"], json!(["a"]));

    let (_, body) = send(&app, get("/api/sessions")).await;
    assert_eq!(body["sessions"], json!(["b", "c"]));
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = setup_app(MockConnector::new());

    let (status, body) = send(&app, get("/api/sessions/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, get("/api/sessions/missing/summary")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_summary_follows_latest_result() {
    let connector = MockConnector::new();
    let app = setup_app(connector.clone());
    send(&app, post_json("/control/sessions", start_request("job-1"))).await;
    settle().await;

    let (_, body) = send(&app, get("/api/sessions/job-1/summary")).await;
    assert_eq!(body["items"], json!([]));

    connector.push_json("job-1", StreamKind::Results, json!({"status": "running", "person_count": 14}));
    settle().await;

    let (status, body) = send(&app, get("/api/sessions/job-1/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "job-1");
    assert_eq!(body["items"], json!([{"title": "Total People Count", "value": "14"}]));
}

#[tokio::test]
async fn test_empty_session_id_rejected() {
    let app = setup_app(MockConnector::new());
    let (status, body) = send(&app, post_json("/control/sessions", start_request("  "))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_remove_and_reset() {
    let connector = MockConnector::new();
    let app = setup_app(connector.clone());
    send(&app, post_json("/control/sessions", start_request("a"))).await;
    send(&app, post_json("/control/sessions", start_request("b"))).await;
    settle().await;

    let (status, body) = send(&app, delete("/control/sessions/a")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);
    let (_, body) = send(&app, delete("/control/sessions/a")).await;
    assert_eq!(body["removed"], false);
    settle().await;
    assert_eq!(connector.closes("a", StreamKind::Frames), 1);

    let (status, body) = send(&app, post_json("/control/reset", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);

    let (_, body) = send(&app, get("/api/sessions")).await;
    assert_eq!(body["sessions"], json!([]));
}
