//! Chat-completions provider.
//!
//! Sends a system prompt, the few-shot training pairs as alternating
//! user/assistant turns, and finally the V3 input as the last user turn.
//! The model's reply is expected to be the bare V4 JSON.

use crate::provider::{http_client, parse_payload, post_json, ConversionProvider, ProviderError};
use crate::training::TrainingPair;
use atomize_core::MappingTable;
use serde_json::{json, Value};
use std::fmt::Write as _;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Request parameters of a [`ChatProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: crate::DEFAULT_TIMEOUT_SECS,
        }
    }
}

pub struct ChatProvider {
    settings: ChatSettings,
    api_key: String,
    system_prompt: String,
    examples: Vec<TrainingPair>,
    http_client: reqwest::blocking::Client,
}

impl ChatProvider {
    /// Create a provider. An empty key is treated as missing.
    pub fn new(
        settings: ChatSettings,
        api_key: String,
        system_prompt: String,
        examples: Vec<TrainingPair>,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials("api key".to_string()));
        }
        let http_client = http_client(settings.timeout_secs)?;
        Ok(Self {
            settings,
            api_key,
            system_prompt,
            examples,
            http_client,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// The request body sent for `v3`.
    #[must_use]
    pub fn request_body(&self, v3: &Value) -> Value {
        let mut messages = Vec::with_capacity(2 + 2 * self.examples.len());
        messages.push(json!({ "role": "system", "content": self.system_prompt }));
        for pair in &self.examples {
            messages.push(json!({ "role": "user", "content": pair.v3.to_string() }));
            messages.push(json!({ "role": "assistant", "content": pair.v4.to_string() }));
        }
        messages.push(json!({ "role": "user", "content": v3.to_string() }));

        json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "messages": messages,
        })
    }
}

impl ConversionProvider for ChatProvider {
    fn name(&self) -> &str {
        "chat"
    }

    fn convert(&self, v3: &Value) -> Result<Value, ProviderError> {
        info!(
            provider = self.name(),
            model = %self.settings.model,
            examples = self.examples.len(),
            "requesting conversion"
        );
        let request = self
            .http_client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key);
        let body = post_json(request, &self.request_body(v3))?;
        parse_completion(&body)
    }
}

/// Extract and parse the V4 JSON from a chat-completions response body.
pub fn parse_completion(body: &str) -> Result<Value, ProviderError> {
    let response: Value =
        serde_json::from_str(body).map_err(|e| ProviderError::Json(e.to_string()))?;
    if let Some(message) = crate::provider::rejection(&response) {
        return Err(ProviderError::Rejected(message));
    }
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Format("missing choices[0].message.content".to_string()))?;
    debug!(chars = content.len(), "received completion");
    parse_payload(strip_code_fence(content))
}

/// Models sometimes wrap JSON in a markdown fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// A system prompt describing the conversion rules in `table`.
#[must_use]
pub fn system_prompt(table: &MappingTable) -> String {
    let mut prompt = String::from(
        "You are a JSON transformer converting legacy V3 page-builder elements \
         into V4 atomic elements.\n\n\
         Every V4 element has id, elType, widgetType, settings, elements, isInner, \
         styles, editor_settings and version \"0.0\". Keep every id unchanged. \
         Every setting and style property is an object {\"$$type\": tag, \"value\": payload}. \
         Style-bound properties go into one local class per element, listed in \
         styles under its id and referenced from settings.classes.\n\n\
         Use these mappings:\n",
    );
    for (kind, widget) in &table.widgets {
        let _ = writeln!(prompt, "\n- {kind} -> {}", widget.widget_type);
        for (property, mapping) in &widget.properties {
            let _ = writeln!(
                prompt,
                "  - \"{property}\" -> {} ({})",
                mapping.target,
                mapping.tag
            );
        }
    }
    prompt.push_str(
        "\nRecursively convert child elements. Omit properties you cannot map.\n\
         Respond ONLY with the JSON object, no explanation or extra text.\n\
         If the input is invalid, respond with {\"error\": \"description\"} only.\n",
    );
    prompt
}
