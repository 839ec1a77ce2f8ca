//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get, post_raw, TestApp};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = TestApp::slow();
    let response = get(app.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let app = TestApp::slow();
    let response = get(app.app(), "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Endpoint not found");
    assert_eq!(json["path"], "/this-route-does-not-exist");
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = TestApp::slow();
    let response = get(app.app(), "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36, "x-request-id should be a UUID string");
}

#[tokio::test]
async fn cors_preflight_returns_correct_headers() {
    let app = TestApp::slow();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/process")
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    let allow_origin = headers
        .get("access-control-allow-origin")
        .expect("Missing Access-Control-Allow-Origin header")
        .to_str()
        .unwrap();
    assert_eq!(allow_origin, "http://localhost:3000");

    let allow_methods = headers
        .get("access-control-allow-methods")
        .expect("Missing Access-Control-Allow-Methods header")
        .to_str()
        .unwrap();
    assert!(allow_methods.contains("POST"), "got: {allow_methods}");
}

#[tokio::test]
async fn malformed_json_body_returns_400() {
    let app = TestApp::slow();
    let response = post_raw(app.app(), "/api/process", "application/json", "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn system_status_reports_services_and_metrics() {
    let app = TestApp::slow();
    app.submit("natural").await;

    let response = get(app.app(), "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["status"], "operational");
    assert_eq!(data["pipelineMode"], "local");
    for service in ["api", "processing", "storage", "ai"] {
        assert_eq!(data["services"][service], "operational", "service {service}");
    }
    assert_eq!(data["metrics"]["totalJobs"], 1);
    assert!(data["uptimeSecs"].is_u64());
}
