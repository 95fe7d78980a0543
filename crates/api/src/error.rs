use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use swapdeck_core::admission::CapacityExceeded;
use swapdeck_core::error::CoreError;
use swapdeck_db::StoreError;
use swapdeck_upstream::UpstreamError;

/// Application-level error type for HTTP handlers.
///
/// Wraps domain, store and upstream errors and adds HTTP-specific variants.
/// Every variant renders as `{ "success": false, "error": ..., "code": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `swapdeck_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The upstream generation call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A credential store failure. `context` is the message shown to the
    /// caller when the cause is internal.
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    /// The admission controller is full.
    #[error("Server at capacity ({active}/{max}). Please wait and try again.")]
    Capacity { active: usize, max: usize },

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request did not finish within the server's request timeout.
    #[error("Request timed out")]
    RequestTimeout,

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Adapter for `map_err` that tags a [`StoreError`] with the public
    /// message to use if it turns out to be internal.
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> AppError {
        move |source| AppError::Store { context, source }
    }
}

impl From<CapacityExceeded> for AppError {
    fn from(err: CapacityExceeded) -> Self {
        AppError::Capacity {
            active: err.active,
            max: err.limit,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::PayloadTooLarge(msg) => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
                }
            },

            // --- Upstream errors ---
            AppError::Upstream(err) => classify_upstream_error(err),

            // --- Store errors ---
            AppError::Store { context, source } => match source {
                StoreError::DuplicateUsername(_) => (
                    StatusCode::BAD_REQUEST,
                    "USERNAME_TAKEN",
                    "Username already taken".to_string(),
                ),
                StoreError::Database(err) => {
                    tracing::error!(error = %err, context, "Credential store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        context.to_string(),
                    )
                }
            },

            // --- Capacity ---
            AppError::Capacity { active, max } => {
                let body = json!({
                    "success": false,
                    "error": self.to_string(),
                    "code": "CAPACITY_EXCEEDED",
                    "activeRequests": active,
                    "maxConcurrent": max,
                });
                return (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response();
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::RequestTimeout => (
                StatusCode::REQUEST_TIMEOUT,
                "REQUEST_TIMEOUT",
                self.to_string(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify an upstream failure into an HTTP status, error code, and message.
///
/// - Timeouts map to 504.
/// - Upstream rejections and replies without an image map to 502 and pass
///   the upstream's own message through.
/// - Transport failures map to 502 with a generic message.
fn classify_upstream_error(err: &UpstreamError) -> (StatusCode, &'static str, String) {
    match err {
        UpstreamError::Timeout(_) => {
            tracing::warn!(error = %err, "Upstream timeout");
            (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", err.to_string())
        }
        UpstreamError::Api { status, message } => {
            tracing::warn!(upstream_status = status, error = %message, "Upstream rejected request");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message.clone())
        }
        UpstreamError::MissingOutput { .. } => {
            (StatusCode::BAD_GATEWAY, "UPSTREAM_NO_OUTPUT", err.to_string())
        }
        UpstreamError::Request(inner) => {
            tracing::error!(error = %inner, "Upstream transport error");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "Upstream request failed".to_string(),
            )
        }
    }
}
