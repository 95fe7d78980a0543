//! HTTP client for the SwapDeck server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use swapdeck_core::dimensions::Dimensions;
use swapdeck_core::generation::{CapacityRejection, GenerationResponse};

use crate::blob::ImageBlob;
use crate::error::ClientError;

/// Default client-side timeout. Longer than the server's request timeout so
/// the server's own timeout reply arrives first.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Issues one generation for the queue engine.
///
/// [`ApiClient`] is the production implementation; tests substitute their
/// own.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn process_single(
        &self,
        face: &ImageBlob,
        target: &ImageBlob,
        api_key: &str,
        dimensions: Dimensions,
    ) -> Result<GenerationResponse, ClientError>;
}

/// Successful `POST /api/login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginReply {
    pub username: String,
    pub api_key: String,
}

/// Fields for `POST /api/register`.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub master_code: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub api_key: &'a str,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for the account's upstream key.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginReply, ClientError> {
        let response = self
            .http
            .post(self.url("/api/login"))
            .timeout(self.timeout)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => {
                let body = read_json(response).await;
                Err(ClientError::Unauthorized(error_message(&body, 401)))
            }
            status => Err(api_error(status, read_json(response).await)),
        }
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn register(&self, input: &Registration<'_>) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url("/api/register"))
            .timeout(self.timeout)
            .json(&json!({
                "masterCode": input.master_code,
                "username": input.username,
                "password": input.password,
                "apiKey": input.api_key,
            }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = read_json(response).await;
        match status {
            s if s.is_success() => Ok(body["message"]
                .as_str()
                .unwrap_or("Account created successfully")
                .to_string()),
            StatusCode::FORBIDDEN => Err(ClientError::Unauthorized(error_message(&body, 403))),
            s => Err(api_error(s, body)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Http(err)
        }
    }
}

#[async_trait]
impl GenerationBackend for ApiClient {
    async fn process_single(
        &self,
        face: &ImageBlob,
        target: &ImageBlob,
        api_key: &str,
        dimensions: Dimensions,
    ) -> Result<GenerationResponse, ClientError> {
        let form = Form::new()
            .part("faceRef", image_part(face)?)
            .part("target", image_part(target)?)
            .text("apiKey", api_key.to_string())
            .text("dimensions", dimensions.to_string());

        let response = self
            .http
            .post(self.url("/api/process-single"))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| self.classify(e));
        }

        let body = read_json(response).await;
        if status == StatusCode::SERVICE_UNAVAILABLE {
            if let Ok(rejection) = serde_json::from_value::<CapacityRejection>(body.clone()) {
                tracing::warn!(
                    active = rejection.active_requests,
                    max = rejection.max_concurrent,
                    "Server at capacity",
                );
                return Err(ClientError::Capacity {
                    message: rejection.error,
                    active_requests: rejection.active_requests,
                    max_concurrent: rejection.max_concurrent,
                });
            }
        }
        Err(api_error(status, body))
    }
}

fn image_part(blob: &ImageBlob) -> Result<Part, ClientError> {
    Ok(Part::bytes(blob.bytes.to_vec())
        .file_name(blob.name.clone())
        .mime_str(blob.content_type)?)
}

/// Body as JSON, or `Null` when it is not JSON.
async fn read_json(response: reqwest::Response) -> Value {
    response.json().await.unwrap_or(Value::Null)
}

fn error_message(body: &Value, status: u16) -> String {
    body["error"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

fn api_error(status: StatusCode, body: Value) -> ClientError {
    ClientError::Api {
        status: status.as_u16(),
        message: error_message(&body, status.as_u16()),
    }
}
