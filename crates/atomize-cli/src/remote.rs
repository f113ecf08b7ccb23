//! Implementation of the `atomize remote` command.

use crate::config::AtomizeConfig;
use crate::io::{read_json, write_json};
use anyhow::{Context, Result};
use atomize_provider::convert_checked;
use std::path::PathBuf;

/// Options for the remote command.
#[derive(Debug, Default)]
pub struct RemoteOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub compact: bool,
}

/// Run the configured provider, write its output and report violations.
pub fn run(options: RemoteOptions) -> Result<bool> {
    let config = AtomizeConfig::load(options.config.as_deref())?;
    let table = config.mapping_table()?;
    let provider = config
        .provider
        .build(&table)
        .context("failed to set up provider")?;
    let input = read_json(&options.input)?;

    let checked = convert_checked(provider.as_ref(), &input)
        .with_context(|| format!("{} provider failed", provider.name()))?;
    write_json(&checked.output, options.output.as_deref(), options.compact)?;

    for violation in &checked.violations {
        eprintln!("error: {violation}");
    }
    if !checked.is_valid() {
        eprintln!(
            "{} output has {} violation(s)",
            provider.name(),
            checked.violations.len()
        );
    }
    Ok(checked.is_valid())
}
