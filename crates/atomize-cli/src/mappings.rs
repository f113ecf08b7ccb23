//! Implementation of the `atomize mappings` command.

use crate::config::AtomizeConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Print the effective mapping table as TOML.
pub fn run(config: Option<&Path>) -> Result<()> {
    let table = AtomizeConfig::load(config)?.mapping_table()?;
    let text = table
        .to_toml_string()
        .context("failed to render mapping table")?;
    print!("{text}");
    Ok(())
}
