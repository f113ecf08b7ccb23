//! Conversion providers for Atomize.
//!
//! A provider turns a V3 tree into a V4 tree. The local provider runs the
//! deterministic mapper from `atomize-core`; the chat and webhook
//! providers delegate to a remote service. Whatever a provider returns can
//! be checked with [`convert_checked`].

mod chat;
mod config;
mod local;
mod provider;
mod training;
mod webhook;

pub use chat::{
    parse_completion, system_prompt, ChatProvider, ChatSettings, DEFAULT_ENDPOINT,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
pub use config::{ProviderConfig, ProviderKind, DEFAULT_API_KEY_ENV};
pub use local::LocalProvider;
pub use provider::{
    convert_checked, parse_payload, rejection, CheckedConversion, ConversionProvider,
    ProviderError, DEFAULT_TIMEOUT_SECS,
};
pub use training::{load_training_pairs, TrainingPair};
pub use webhook::WebhookProvider;
