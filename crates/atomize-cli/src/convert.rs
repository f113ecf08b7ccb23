//! Implementation of the `atomize convert` command.

use crate::config::AtomizeConfig;
use crate::io::{read_json, write_json};
use anyhow::{bail, Context, Result};
use atomize_core::{
    ConversionError, Converter, LegacyDocument, LegacyElement, StructuralError,
};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

/// Options for the convert command.
#[derive(Debug, Default)]
pub struct ConvertOptions {
    /// V3 document or element, `-` for stdin.
    pub input: PathBuf,
    /// Output file; stdout when absent.
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Fail on dropped elements or properties, not only on invalid output.
    pub strict: bool,
    pub compact: bool,
}

/// Diagnostics of a conversion run.
#[derive(Debug, Default)]
pub struct ConvertReport {
    pub errors: Vec<ConversionError>,
    pub violations: Vec<StructuralError>,
}

impl ConvertReport {
    /// Whether the run should exit successfully.
    #[must_use]
    pub fn passed(&self, strict: bool) -> bool {
        self.violations.is_empty() && (!strict || self.errors.is_empty())
    }

    pub fn print(&self) {
        for error in &self.errors {
            eprintln!("warning: {error}");
        }
        for violation in &self.violations {
            eprintln!("error: {violation}");
        }
        if !self.errors.is_empty() || !self.violations.is_empty() {
            eprintln!(
                "{} dropped, {} invalid",
                self.errors.len(),
                self.violations.len()
            );
        }
    }
}

/// Convert a parsed V3 value. Documents stay documents; bare elements stay elements.
pub fn convert_value(converter: &Converter<'_>, input: Value) -> Result<(Value, ConvertReport)> {
    if input.get("content").is_some() {
        let document = LegacyDocument::from_value(input).context("malformed V3 document")?;
        let conversion = converter.convert_document(&document);
        let output = serde_json::to_value(&conversion.document)?;
        let report = ConvertReport {
            errors: conversion.errors,
            violations: conversion.violations,
        };
        return Ok((output, report));
    }

    let element: LegacyElement = serde_json::from_value(input).context("malformed V3 element")?;
    let conversion = converter.convert(&element);
    let Some(converted) = conversion.element else {
        let reason = conversion
            .errors
            .first()
            .map_or_else(|| "unknown reason".to_string(), ToString::to_string);
        bail!("nothing converted: {reason}");
    };
    let output = serde_json::to_value(&converted)?;
    let report = ConvertReport {
        errors: conversion.errors,
        violations: conversion.violations,
    };
    Ok((output, report))
}

/// Run the convert command. Returns whether the run passed.
pub fn run(options: ConvertOptions) -> Result<bool> {
    let config = AtomizeConfig::load(options.config.as_deref())?;
    let table = config.mapping_table()?;
    let input = read_json(&options.input)?;

    let (output, report) = convert_value(&Converter::new(&table), input)?;
    write_json(&output, options.output.as_deref(), options.compact)?;
    report.print();

    info!(
        dropped = report.errors.len(),
        violations = report.violations.len(),
        "conversion finished"
    );
    Ok(report.passed(options.strict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomize_core::MappingTable;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn element_stays_element() {
        let table = MappingTable::builtin();
        let (output, report) = convert_value(
            &Converter::new(&table),
            json!({ "id": "b", "elType": "widget", "widgetType": "button", "settings": { "text": "Hi" } }),
        )
        .unwrap();
        assert_eq!(output["widgetType"], "e-button");
        assert!(report.passed(true));
    }

    #[test]
    fn strict_fails_on_drops() {
        let table = MappingTable::builtin();
        let (output, report) = convert_value(
            &Converter::new(&table),
            json!({
                "content": [{
                    "id": "c", "elType": "container",
                    "elements": [{ "id": "x", "elType": "widget", "widgetType": "spacer" }]
                }],
                "version": "0.4",
                "type": "container"
            }),
        )
        .unwrap();
        assert_eq!(output["content"][0]["elements"], json!([]));
        assert!(report.passed(false));
        assert!(!report.passed(true));
    }

    #[test]
    fn unresolvable_root_errors() {
        let table = MappingTable::builtin();
        let err = convert_value(&Converter::new(&table), json!({ "id": "s", "elType": "section" }))
            .unwrap_err();
        assert!(err.to_string().contains("section"));
    }

    #[test]
    fn run_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        fs::write(&input, r#"{"id": "h", "elType": "widget", "widgetType": "heading"}"#).unwrap();

        let passed = run(ConvertOptions {
            input,
            output: Some(output.clone()),
            config: Some(dir.path().join("missing.toml")),
            ..ConvertOptions::default()
        });
        // An explicit config path must exist.
        assert!(passed.is_err());

        let config = dir.path().join("atomize.toml");
        fs::write(&config, "").unwrap();
        let passed = run(ConvertOptions {
            input: dir.path().join("in.json"),
            output: Some(output.clone()),
            config: Some(config),
            ..ConvertOptions::default()
        })
        .unwrap();
        assert!(passed);

        let written: Value = serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(written["widgetType"], "e-heading");
    }
}
