//! Provider backed by an arbitrary HTTP endpoint.

use crate::provider::{http_client, parse_payload, post_json, ConversionProvider, ProviderError};
use serde_json::Value;
use tracing::info;

/// POSTs the V3 JSON to `endpoint` and reads V4 JSON back.
pub struct WebhookProvider {
    endpoint: String,
    http_client: reqwest::blocking::Client,
}

impl WebhookProvider {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::Config(format!(
                "webhook endpoint '{endpoint}' is not an http(s) url"
            )));
        }
        Ok(Self {
            endpoint,
            http_client: http_client(timeout_secs)?,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ConversionProvider for WebhookProvider {
    fn name(&self) -> &str {
        "webhook"
    }

    fn convert(&self, v3: &Value) -> Result<Value, ProviderError> {
        info!(provider = self.name(), endpoint = %self.endpoint, "requesting conversion");
        let body = post_json(self.http_client.post(&self.endpoint), v3)?;
        parse_payload(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_http() {
        assert!(matches!(
            WebhookProvider::new("ftp://host/convert", 5),
            Err(ProviderError::Config(_))
        ));
        let provider = WebhookProvider::new("https://hooks.test/convert", 5).unwrap();
        assert_eq!(provider.endpoint(), "https://hooks.test/convert");
    }
}
