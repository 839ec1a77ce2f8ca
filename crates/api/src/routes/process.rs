use axum::routing::{get, post};
use axum::Router;

use crate::handlers::process;
use crate::state::AppState;

/// Routes mounted at `/process`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> submit_job
/// GET    /{id}            -> get_job
/// DELETE /{id}            -> delete_job
/// POST   /{id}/notify     -> notify_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(process::list_jobs).post(process::submit_job))
        .route("/{id}", get(process::get_job).delete(process::delete_job))
        .route("/{id}/notify", post(process::notify_job))
}
