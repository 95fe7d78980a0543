//! Locating the output URL in an upstream reply.
//!
//! The upstream has answered in several shapes over time. They are tried in
//! this order, where `data` is the `data` member when present and non-null,
//! otherwise the whole body:
//!
//! 1. `data.output` as an array -> first element
//! 2. `data.outputs` as an array -> first element
//! 3. `data.output` as a string
//! 4. top-level `output` as an array -> first element

use serde_json::Value;

/// Return the single output URL, or `None` if no shape matched.
pub fn extract_output_url(body: &Value) -> Option<String> {
    let data = match body.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => body,
    };

    let candidate = match (data.get("output"), data.get("outputs")) {
        (Some(Value::Array(items)), _) => items.first(),
        (_, Some(Value::Array(items))) => items.first(),
        (Some(url @ Value::String(_)), _) => Some(url),
        _ => body
            .get("output")
            .and_then(Value::as_array)
            .and_then(|items| items.first()),
    };

    candidate
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// Pull a human-readable message out of an upstream error body.
///
/// Prefers `error`, then `message`, looking at the top level and inside
/// `data`.
pub fn extract_error_message(body: &Value) -> Option<String> {
    let scopes = [Some(body), body.get("data")];
    scopes
        .into_iter()
        .flatten()
        .flat_map(|scope| [scope.get("error"), scope.get("message")])
        .flatten()
        .find_map(|value| value.as_str().filter(|msg| !msg.is_empty()))
        .map(str::to_string)
}
