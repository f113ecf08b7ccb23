//! The provider seam and what every provider shares.

use atomize_core::{validate_document_json, validate_json, InputError, StructuralError};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default bound on a single provider call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when running a conversion provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider rejected the input: {0}")]
    Rejected(String),

    #[error("provider returned malformed JSON: {0}")]
    Json(String),

    #[error("unexpected provider response: {0}")]
    Format(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no credentials: environment variable {0} is not set")]
    MissingCredentials(String),

    #[error("provider misconfigured: {0}")]
    Config(String),

    #[error(transparent)]
    Input(#[from] InputError),
}

/// Something that turns a V3 tree into a V4 tree.
pub trait ConversionProvider {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Convert a V3 document or element. The output is not validated.
    fn convert(&self, v3: &Value) -> Result<Value, ProviderError>;
}

/// Provider output together with its structural violations.
#[derive(Debug, Clone)]
pub struct CheckedConversion {
    pub output: Value,
    pub violations: Vec<StructuralError>,
}

impl CheckedConversion {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Run a provider, then validate what it produced.
///
/// Documents (objects with `content`) are validated as documents, anything
/// else as a single element.
pub fn convert_checked(
    provider: &dyn ConversionProvider,
    v3: &Value,
) -> Result<CheckedConversion, ProviderError> {
    let output = provider.convert(v3)?;
    let violations = if output.get("content").is_some() {
        validate_document_json(&output)
    } else {
        validate_json(&output)
    };
    debug!(
        provider = provider.name(),
        violations = violations.len(),
        "validated provider output"
    );
    Ok(CheckedConversion { output, violations })
}

/// The message of an `{"error": ...}` response, if that is what `value` is.
///
/// Accepts both a bare string and an object carrying a `message`.
#[must_use]
pub fn rejection(value: &Value) -> Option<String> {
    let error = value.as_object()?.get("error")?;
    match error {
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified error")
                .to_string(),
        ),
        _ => None,
    }
}

/// Parse a JSON payload returned by a provider, surfacing rejections.
pub fn parse_payload(text: &str) -> Result<Value, ProviderError> {
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|e| ProviderError::Json(e.to_string()))?;
    match rejection(&value) {
        Some(message) => Err(ProviderError::Rejected(message)),
        None => Ok(value),
    }
}

/// Blocking HTTP client with a per-request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, ProviderError> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("atomize/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

/// POST `body` and return the response text.
///
/// Non-success statuses become [`ProviderError::Rejected`] when the body
/// carries an error message and [`ProviderError::Network`] otherwise.
pub(crate) fn post_json(
    request: reqwest::blocking::RequestBuilder,
    body: &Value,
) -> Result<String, ProviderError> {
    let response = request
        .json(body)
        .send()
        .map_err(|e| ProviderError::Network(e.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| ProviderError::Network(e.to_string()))?;
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|value| rejection(&value));
        return Err(match message {
            Some(message) => ProviderError::Rejected(message),
            None => ProviderError::Network(format!("HTTP {status}")),
        });
    }
    Ok(text)
}
