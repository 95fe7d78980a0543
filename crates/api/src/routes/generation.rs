//! Route definitions for generation endpoints.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use axum::Router;
use swapdeck_core::uploads::{MAX_FILES_PER_REQUEST, MAX_UPLOAD_BYTES};

use crate::handlers::generation;
use crate::middleware::admission::admit;
use crate::state::AppState;

/// Whole-body ceiling for one multipart form: every allowed file at the
/// per-file limit plus room for text fields and boundaries.
pub const MAX_FORM_BYTES: usize = MAX_FILES_PER_REQUEST * MAX_UPLOAD_BYTES + 1024 * 1024;

/// Routes mounted at `/api`.
///
/// ```text
/// POST /process-single  -> process_single (admission-gated)
/// ```
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/process-single", post(generation::process_single))
        .route_layer(from_fn_with_state(state.clone(), admit))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}
