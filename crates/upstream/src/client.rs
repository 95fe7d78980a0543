//! HTTP client for the upstream edit endpoint.
//!
//! Wraps one `POST` per generation using [`reqwest`]. Synchronous mode keeps
//! the connection open until the image is ready, so every request carries a
//! long timeout.

use std::time::Duration;

use serde_json::Value;
use swapdeck_core::dimensions::Dimensions;

use crate::payload::{FaceSwapRequest, ImageInput};
use crate::response::{extract_error_message, extract_output_url};

/// Path of the sequential edit model on the upstream host.
pub const EDIT_PATH: &str = "/api/v3/bytedance/seedream-v4/edit-sequential";

/// Default upstream host.
pub const DEFAULT_BASE_URL: &str = "https://api.wavespeed.ai";

/// Default per-call timeout. Sync-mode generations regularly take minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Connection settings for [`UpstreamClient`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Scheme and host, without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Errors from the upstream layer.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// No response within the configured timeout.
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream answered with a non-2xx status.
    #[error("{message}")]
    Api {
        status: u16,
        /// The upstream's own message when it sent one.
        message: String,
    },

    /// A 2xx reply in which no output URL could be found.
    #[error("No output image received from API")]
    MissingOutput {
        /// Raw reply, kept for logging.
        body: Value,
    },
}

/// HTTP client for the upstream generation API.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Run one face-swap generation and return the output URL.
    pub async fn face_swap(
        &self,
        api_key: &str,
        face: ImageInput<'_>,
        target: ImageInput<'_>,
        dimensions: Dimensions,
    ) -> Result<String, UpstreamError> {
        let body = FaceSwapRequest::new(face, target, dimensions);
        tracing::debug!(size = %body.size, images = body.images.len(), "Sending upstream request");

        let reply = self.send(api_key, &body).await?;
        extract_output_url(&reply).ok_or_else(|| {
            tracing::error!(response = %reply, "Upstream reply carried no output URL");
            UpstreamError::MissingOutput { body: reply }
        })
    }

    async fn send(&self, api_key: &str, body: &FaceSwapRequest) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .post(format!("{}{EDIT_PATH}", self.config.base_url))
            .bearer_auth(api_key)
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|json| extract_error_message(&json))
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.config.timeout)
        } else {
            UpstreamError::Request(err)
        }
    }
}
