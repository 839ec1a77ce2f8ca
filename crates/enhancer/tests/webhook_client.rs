use std::time::Duration;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sellora_enhancer::{EnhanceApi, EnhanceApiError, EnhanceRequest, ProductInfo};

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn request() -> EnhanceRequest {
    EnhanceRequest::new(
        b"source-bytes",
        "vintage",
        ProductInfo {
            name: "Teapot".into(),
            brand: "Kiln".into(),
            description: "Hand thrown".into(),
        },
    )
}

#[tokio::test]
async fn returns_decoded_image_from_json_response() {
    let router = Router::new().route(
        "/enhance",
        post(|Json(body): Json<serde_json::Value>| async move {
            // Echo the style back inside the "image" so the test can see it arrived.
            let style = body["style_name"].as_str().unwrap_or_default().to_string();
            Json(serde_json::json!({ "image": STANDARD.encode(format!("enhanced-{style}")) }))
        }),
    );
    let base = spawn_server(router).await;

    let api = EnhanceApi::new(format!("{base}/enhance"), Duration::from_secs(5)).unwrap();
    let bytes = api.enhance(&request()).await.unwrap();

    assert_eq!(bytes, b"enhanced-vintage");
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let router = Router::new().route(
        "/enhance",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let base = spawn_server(router).await;

    let api = EnhanceApi::new(format!("{base}/enhance"), Duration::from_secs(5)).unwrap();
    let err = api.enhance(&request()).await.unwrap_err();

    assert_matches!(err, EnhanceApiError::ApiError { status: 502, ref body } if body == "upstream down");
}

#[tokio::test]
async fn slow_webhook_times_out() {
    let router = Router::new().route(
        "/enhance",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late"
        }),
    );
    let base = spawn_server(router).await;

    let api = EnhanceApi::new(format!("{base}/enhance"), Duration::from_millis(100)).unwrap();
    let err = api.enhance(&request()).await.unwrap_err();

    assert_matches!(err, EnhanceApiError::Request(e) if e.is_timeout());
}
