use std::sync::Arc;

use swapdeck_core::admission::AdmissionController;
use swapdeck_db::UserStore;
use swapdeck_upstream::UpstreamClient;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is an `Arc` or wraps one.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Account lookup and creation (Postgres or in-memory).
    pub users: Arc<dyn UserStore>,
    /// Client for the upstream generation API.
    pub upstream: UpstreamClient,
    /// Gate in front of every upstream generation call.
    pub admission: AdmissionController,
}

impl AppState {
    /// Build state from config, deriving the upstream client and the
    /// admission limit from it.
    pub fn new(config: ServerConfig, users: Arc<dyn UserStore>) -> Self {
        let upstream = UpstreamClient::new(config.upstream.clone());
        let admission = AdmissionController::new(config.max_concurrent_generations);
        Self {
            config: Arc::new(config),
            users,
            upstream,
            admission,
        }
    }
}
