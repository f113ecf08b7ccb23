//! Loading of `atomize.toml`.

use anyhow::{Context, Result};
use atomize_core::{MappingOverrides, MappingTable, WidgetOverride};
use atomize_provider::ProviderConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "atomize.toml";

/// Contents of `atomize.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomizeConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Mapping table overrides, keyed by legacy widget kind.
    #[serde(default)]
    pub widgets: BTreeMap<String, WidgetOverride>,
}

impl AtomizeConfig {
    /// Load the config at `path`, or `./atomize.toml` if present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None if Path::new(CONFIG_FILE).is_file() => Self::from_path(Path::new(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The built-in mapping table with this config's overrides applied.
    pub fn mapping_table(&self) -> Result<MappingTable> {
        let mut table = MappingTable::builtin();
        let overrides = MappingOverrides {
            widgets: self.widgets.clone(),
        };
        if !overrides.is_empty() {
            table
                .merge(overrides)
                .context("failed to apply mapping overrides")?;
        }
        Ok(table)
    }
}
