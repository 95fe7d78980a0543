pub mod auth;
pub mod generation;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /login               login (public)
/// /register            register (master code)
/// /process-single      one face swap (admission-gated)
/// ```
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(generation::router(state))
}
