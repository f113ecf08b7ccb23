//! The `[provider]` configuration section.

use crate::chat::{system_prompt, ChatProvider, ChatSettings, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::local::LocalProvider;
use crate::provider::{ConversionProvider, ProviderError, DEFAULT_TIMEOUT_SECS};
use crate::training::load_training_pairs;
use crate::webhook::WebhookProvider;
use atomize_core::MappingTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable read for the chat API key unless configured otherwise.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Which provider to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Local,
    Chat,
    Webhook,
}

/// Provider settings. Credentials are never stored here, only the name of
/// the environment variable holding them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// Chat or webhook URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Directory of few-shot training pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples_dir: Option<PathBuf>,

    /// Replaces the prompt generated from the mapping table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            endpoint: None,
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
            examples_dir: None,
            system_prompt: None,
        }
    }
}

impl ProviderConfig {
    /// Build the configured provider.
    ///
    /// `table` backs the local provider and the generated chat prompt.
    pub fn build(&self, table: &MappingTable) -> Result<Box<dyn ConversionProvider>, ProviderError> {
        debug!(kind = ?self.kind, "building provider");
        match self.kind {
            ProviderKind::Local => Ok(Box::new(LocalProvider::new(table.clone()))),
            ProviderKind::Chat => {
                let api_key = std::env::var(&self.api_key_env)
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| ProviderError::MissingCredentials(self.api_key_env.clone()))?;
                let examples = self
                    .examples_dir
                    .as_deref()
                    .map(load_training_pairs)
                    .unwrap_or_default();
                let prompt = self
                    .system_prompt
                    .clone()
                    .unwrap_or_else(|| system_prompt(table));
                let settings = ChatSettings {
                    endpoint: self
                        .endpoint
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                    model: self.model.clone(),
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                    timeout_secs: self.timeout_secs,
                };
                Ok(Box::new(ChatProvider::new(settings, api_key, prompt, examples)?))
            }
            ProviderKind::Webhook => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    ProviderError::Config("webhook provider needs an endpoint".to_string())
                })?;
                Ok(Box::new(WebhookProvider::new(endpoint, self.timeout_secs)?))
            }
        }
    }
}
