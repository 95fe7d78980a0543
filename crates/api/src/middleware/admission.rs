//! Admission gate for upstream generation routes.
//!
//! Rejects with `503 CAPACITY_EXCEEDED` when the controller is full. An
//! admitted request carries its permit inside the response body, so the
//! slot frees when the body has been fully sent or the client goes away,
//! whichever comes first.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use futures::StreamExt;

use crate::error::AppResult;
use crate::state::AppState;

pub async fn admit(State(state): State<AppState>, request: Request, next: Next) -> AppResult<Response> {
    let permit = state.admission.try_acquire().inspect_err(|rejected| {
        tracing::warn!(
            active = rejected.active,
            limit = rejected.limit,
            path = %request.uri().path(),
            "Generation rejected at capacity",
        );
    })?;

    tracing::debug!(
        active = state.admission.active(),
        limit = state.admission.limit(),
        "Generation admitted",
    );

    let response = next.run(request).await;
    let (parts, body) = response.into_parts();
    let body = Body::from_stream(body.into_data_stream().map(move |chunk| {
        let _held = &permit;
        chunk
    }));

    Ok(Response::from_parts(parts, body))
}
