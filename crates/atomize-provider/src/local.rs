//! In-process deterministic provider.

use crate::provider::{ConversionProvider, ProviderError};
use atomize_core::{Converter, LegacyDocument, LegacyElement, MappingTable};
use serde_json::Value;
use tracing::{info, warn};

/// Converts with the built-in mapper. Never touches the network.
#[derive(Debug, Clone, Default)]
pub struct LocalProvider {
    table: MappingTable,
}

impl LocalProvider {
    #[must_use]
    pub fn new(table: MappingTable) -> Self {
        Self { table }
    }

    fn to_value<T: serde::Serialize>(output: &T) -> Result<Value, ProviderError> {
        serde_json::to_value(output).map_err(|e| ProviderError::Json(e.to_string()))
    }
}

impl ConversionProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    /// Documents convert to documents and bare elements to elements.
    ///
    /// Dropped elements and properties are logged; a bare element whose
    /// own kind does not resolve is rejected.
    fn convert(&self, v3: &Value) -> Result<Value, ProviderError> {
        info!(provider = self.name(), "converting");
        let converter = Converter::new(&self.table);

        if v3.get("content").is_some() {
            let document = LegacyDocument::from_value(v3.clone())?;
            let conversion = converter.convert_document(&document);
            for error in &conversion.errors {
                warn!(%error, "dropped during conversion");
            }
            return Self::to_value(&conversion.document);
        }

        let element: LegacyElement = serde_json::from_value(v3.clone())
            .map_err(|e| ProviderError::Input(e.into()))?;
        let conversion = converter.convert(&element);
        for error in &conversion.errors {
            warn!(%error, "dropped during conversion");
        }
        match conversion.element {
            Some(element) => Self::to_value(&element),
            None => Err(ProviderError::Rejected(
                conversion
                    .errors
                    .first()
                    .map_or_else(|| "nothing to convert".to_string(), ToString::to_string),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn element_in_element_out() {
        let provider = LocalProvider::default();
        let output = provider
            .convert(&json!({
                "id": "h", "elType": "widget", "widgetType": "heading",
                "settings": { "title_color": "#101010" }
            }))
            .unwrap();
        assert_eq!(output["widgetType"], "e-heading");
        assert_eq!(output["version"], "0.0");
    }

    #[test]
    fn document_in_document_out() {
        let provider = LocalProvider::default();
        let output = provider
            .convert(&json!({
                "content": [{ "id": "c", "elType": "container" }],
                "version": "0.4",
                "type": "container"
            }))
            .unwrap();
        assert_eq!(output["content"][0]["widgetType"], "e-flexbox");
        assert_eq!(output["type"], "container");
    }

    #[test]
    fn unresolvable_root_is_rejected() {
        let provider = LocalProvider::default();
        let err = provider
            .convert(&json!({ "id": "s", "elType": "section" }))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(m) if m.contains("section")));
    }

    #[test]
    fn malformed_input() {
        let provider = LocalProvider::default();
        assert!(matches!(
            provider.convert(&json!({ "elType": "widget" })),
            Err(ProviderError::Input(_))
        ));
    }
}
