pub mod health;
pub mod process;
pub mod status;

use axum::extract::OriginalUri;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /process                    submit, list
/// /process/{id}               get, delete
/// /process/{id}/notify        email on completion
/// /status                     system status and metrics
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/process", process::router())
        .nest("/status", status::router())
}

/// JSON 404 for any unmatched path.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "message": "Endpoint not found",
            "code": "NOT_FOUND",
            "path": uri.path(),
        })),
    )
}
