//! Generation outcomes and the wire shapes shared by server and client.

use serde::{Deserialize, Serialize};

/// Variation count used by "add more" when the queue has no items yet.
pub const DEFAULT_VARIATION_COUNT: u32 = 3;

/// Upper bound on variations per item accepted by the queue.
pub const MAX_VARIATION_COUNT: u32 = 20;

/// Outcome of one generation attempt.
///
/// Serializes as `{"url": ...}` or `{"error": ...}`; never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariationResult {
    Success { url: String },
    Failure {
        #[serde(rename = "error")]
        message: String,
    },
}

impl VariationResult {
    pub fn success(url: impl Into<String>) -> Self {
        Self::Success { url: url.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The output URL for a successful attempt.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Success { url } => Some(url),
            Self::Failure { .. } => None,
        }
    }
}

/// Body returned by `POST /api/process-single`.
///
/// The server sets `output_url` on success and `error` on failure; both are
/// optional so a client can still decode a malformed reply and report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResponse {
    pub fn succeeded(output_url: impl Into<String>) -> Self {
        Self {
            success: true,
            output_url: Some(output_url.into()),
            error: None,
        }
    }

    /// Collapse the response into a [`VariationResult`].
    ///
    /// `success=false`, or `success=true` without a URL, is a failure.
    pub fn into_variation_result(self) -> VariationResult {
        match (self.success, self.output_url) {
            (true, Some(url)) if !url.is_empty() => VariationResult::Success { url },
            (true, _) => VariationResult::failure("GENERATION FAILED: response carried no output URL"),
            (false, _) => {
                VariationResult::failure(self.error.unwrap_or_else(|| "GENERATION FAILED".into()))
            }
        }
    }
}

/// Body returned with `503` when the admission controller rejects a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRejection {
    pub error: String,
    pub active_requests: usize,
    pub max_concurrent: usize,
}
