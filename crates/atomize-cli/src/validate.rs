//! Implementation of the `atomize validate` command.

use crate::io::read_json;
use anyhow::Result;
use atomize_core::{validate_document_json, validate_json, StructuralError};
use serde_json::Value;
use std::path::Path;

/// Validate a V4 document (object with `content`) or a single element.
#[must_use]
pub fn check(value: &Value) -> Vec<StructuralError> {
    if value.get("content").is_some() {
        validate_document_json(value)
    } else {
        validate_json(value)
    }
}

/// Run the validate command. Returns whether the input is valid.
pub fn run(input: &Path) -> Result<bool> {
    let value = read_json(input)?;
    let violations = check(&value);
    for violation in &violations {
        println!("{violation}");
    }
    if violations.is_empty() {
        eprintln!("{}: valid", input.display());
    } else {
        eprintln!("{}: {} violation(s)", input.display(), violations.len());
    }
    Ok(violations.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_document_or_element() {
        let document = json!({ "content": [{ "id": "a" }], "version": "0.4", "type": "container" });
        assert!(check(&document)
            .iter()
            .all(|violation| violation.path.starts_with("content[0]")));

        let element = json!({
            "id": "a", "elType": "container", "widgetType": "e-flexbox",
            "settings": {}, "elements": [], "isInner": false,
            "styles": {}, "editor_settings": {}, "version": "0.0"
        });
        assert!(check(&element).is_empty());
    }
}
