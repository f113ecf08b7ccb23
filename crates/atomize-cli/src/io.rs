//! Reading inputs and writing outputs.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Read JSON from `path`, or from stdin when `path` is `-`.
pub fn read_json(path: &Path) -> Result<Value> {
    let content = if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read stdin")?;
        content
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Write `value` to `output`, or to stdout.
pub fn write_json(value: &Value, output: Option<&Path>, compact: bool) -> Result<()> {
    let mut text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    match output {
        Some(path) => {
            text.push('\n');
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => println!("{text}"),
    }
    Ok(())
}
