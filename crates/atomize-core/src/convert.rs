//! Recursive V3 to V4 tree conversion.
//!
//! Conversion is best-effort. An element whose kind cannot be resolved is
//! dropped together with its subtree, and a property whose value cannot be
//! encoded is dropped from its element; each drop is recorded as a
//! [`ConversionError`]. The produced tree is then run through the
//! structural validator and its violations returned alongside it.

use crate::element::{
    Document, Element, ElementKind, LegacyDocument, LegacyElement, META_VERSION,
};
use crate::encode::{encode, EncodingError};
use crate::mapping::{MappingTable, Target, WidgetMapping};
use crate::style::ClassRegistry;
use crate::validate::{validate_element, validate_elements, StructuralError};
use crate::value::TypedValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Setting that links an element to its local style class.
pub const CLASSES_SETTING: &str = "classes";

/// A legacy element kind with no V4 counterpart.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("element '{element_id}': no V4 widget type for legacy kind '{kind}'")]
    UnknownWidgetKind { element_id: String, kind: String },
}

/// A recoverable, element- or property-scoped conversion failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("element '{element_id}': dropped property '{property}': {source}")]
    Encoding {
        element_id: String,
        property: String,
        source: EncodingError,
    },

    #[error("element '{element_id}': dropped property '{property}': no `{setting}` setting has a `{field}` field to hold it")]
    Unplaced {
        element_id: String,
        property: String,
        setting: String,
        field: String,
    },
}

impl ConversionError {
    /// Id of the element the failure is scoped to.
    #[must_use]
    pub fn element_id(&self) -> &str {
        match self {
            Self::Mapping(MappingError::UnknownWidgetKind { element_id, .. })
            | Self::Encoding { element_id, .. }
            | Self::Unplaced { element_id, .. } => element_id,
        }
    }
}

/// Result of converting one element tree.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// The converted tree, or `None` if the root itself failed to resolve.
    pub element: Option<Element>,
    /// Element- and property-scoped failures, in the order they occurred.
    pub errors: Vec<ConversionError>,
    /// Structural violations of the converted tree.
    pub violations: Vec<StructuralError>,
}

impl Conversion {
    /// Returns true if nothing was dropped and the output is valid.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.violations.is_empty()
    }
}

/// Result of converting a whole document.
#[derive(Debug, Clone)]
pub struct DocumentConversion {
    pub document: Document,
    pub errors: Vec<ConversionError>,
    pub violations: Vec<StructuralError>,
}

impl DocumentConversion {
    /// Returns true if nothing was dropped and the output is valid.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.violations.is_empty()
    }
}

/// Per-run accumulator threaded through the recursion.
#[derive(Default)]
struct Run {
    errors: Vec<ConversionError>,
    classes: ClassRegistry,
}

/// A setting field assignment deferred until all settings are placed.
struct FieldPatch<'s> {
    property: &'s str,
    setting: &'s str,
    field: &'s str,
    value: TypedValue,
}

/// Converts legacy trees using a mapping table.
#[derive(Debug, Clone, Copy)]
pub struct Converter<'t> {
    table: &'t MappingTable,
}

impl<'t> Converter<'t> {
    #[must_use]
    pub fn new(table: &'t MappingTable) -> Self {
        Self { table }
    }

    /// The mapping table in use.
    #[must_use]
    pub fn table(&self) -> &'t MappingTable {
        self.table
    }

    /// Convert one element tree and validate the result.
    #[must_use]
    pub fn convert(&self, source: &LegacyElement) -> Conversion {
        let mut run = Run::default();
        let element = self.convert_element(source, &mut run);
        let violations = element.as_ref().map(validate_element).unwrap_or_default();
        Conversion {
            element,
            errors: run.errors,
            violations,
        }
    }

    /// Convert every top-level element of a document and validate the result.
    ///
    /// Class ids are unique across the whole document.
    #[must_use]
    pub fn convert_document(&self, source: &LegacyDocument) -> DocumentConversion {
        let mut run = Run::default();
        let content: Vec<Element> = source
            .content
            .iter()
            .filter_map(|element| self.convert_element(element, &mut run))
            .collect();
        let violations = validate_elements(&content);
        DocumentConversion {
            document: Document {
                content,
                version: source.version.clone(),
                kind: source.kind.clone(),
            },
            errors: run.errors,
            violations,
        }
    }

    fn convert_element(&self, source: &LegacyElement, run: &mut Run) -> Option<Element> {
        let kind_key = source.kind_key();
        let Some(widget) = self.table.widget(kind_key) else {
            warn!(
                element = %source.id,
                kind = kind_key,
                dropped = source.subtree_len(),
                "no V4 widget type, dropping element"
            );
            run.errors.push(
                MappingError::UnknownWidgetKind {
                    element_id: source.id.clone(),
                    kind: kind_key.to_string(),
                }
                .into(),
            );
            return None;
        };

        let (mut settings, style_props) = self.map_settings(source, widget, run);
        let mut styles = BTreeMap::new();
        if let Some(class) = run.classes.synthesize(&source.id, style_props) {
            settings.insert(
                CLASSES_SETTING.to_string(),
                TypedValue::Classes(vec![class.id.clone()]),
            );
            styles.insert(class.id.clone(), class);
        }

        let children = source
            .elements
            .iter()
            .filter_map(|child| self.convert_element(child, run))
            .collect();

        debug!(
            element = %source.id,
            widget_type = %widget.widget_type,
            settings = settings.len(),
            "converted element"
        );

        let kind = if source.is_widget() {
            ElementKind::Widget
        } else {
            ElementKind::Container
        };
        Some(Element {
            id: source.id.clone(),
            kind,
            widget_kind: Some(widget.widget_type.clone()),
            settings,
            children,
            is_inner: source.is_inner,
            styles,
            editor_settings: Map::new(),
            version: META_VERSION.to_string(),
        })
    }

    /// Route every mapped legacy setting to V4 settings or style props.
    fn map_settings(
        &self,
        source: &LegacyElement,
        widget: &WidgetMapping,
        run: &mut Run,
    ) -> (BTreeMap<String, TypedValue>, BTreeMap<String, TypedValue>) {
        let mut settings = BTreeMap::new();
        let mut style_props = BTreeMap::new();
        let mut patches = Vec::new();

        for (property, raw) in &source.settings {
            let Some(mapping) = widget.properties.get(property) else {
                trace!(element = %source.id, property = %property, "no mapping, omitted");
                continue;
            };
            if mapping.target == Target::Discard || is_unset(raw) {
                continue;
            }

            let value = match encode(&mapping.prepare(raw), mapping.tag) {
                Ok(value) => value,
                Err(error) => {
                    warn!(element = %source.id, property = %property, %error, "dropping property");
                    run.errors.push(ConversionError::Encoding {
                        element_id: source.id.clone(),
                        property: property.clone(),
                        source: error,
                    });
                    continue;
                }
            };

            match &mapping.target {
                Target::Setting(name) => {
                    settings.insert(name.clone(), value);
                }
                Target::Style(prop) => {
                    style_props.insert(prop.clone(), value);
                }
                Target::SettingField { setting, field } => patches.push(FieldPatch {
                    property,
                    setting,
                    field,
                    value,
                }),
                Target::Discard => {}
            }
        }

        for patch in patches {
            let placed = settings
                .get_mut(patch.setting)
                .is_some_and(|target| set_field(target, patch.field, &patch.value));
            if !placed {
                warn!(element = %source.id, property = patch.property, "no setting to hold field");
                run.errors.push(ConversionError::Unplaced {
                    element_id: source.id.clone(),
                    property: patch.property.to_string(),
                    setting: patch.setting.to_string(),
                    field: patch.field.to_string(),
                });
            }
        }

        (settings, style_props)
    }
}

/// Legacy controls store unset values as `null` or `""`.
fn is_unset(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Assign a string field inside a composite setting.
fn set_field(target: &mut TypedValue, field: &str, value: &TypedValue) -> bool {
    let TypedValue::String(text) = value else {
        return false;
    };
    match (target, field) {
        (TypedValue::Image(image), "size") => image.size.clone_from(text),
        (TypedValue::Link(link), "label") => link.label.clone_from(text),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Image, ValueError};
    use serde_json::json;

    fn legacy(value: Value) -> LegacyElement {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn heading_settings_split() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "h1", "elType": "widget", "widgetType": "heading",
            "settings": {
                "title": "Welcome",
                "title_color": "#112233",
                "link": { "url": "https://a.test", "is_external": "" },
                "header_size": "h3"
            }
        })));
        assert!(conversion.is_clean(), "{conversion:?}");

        let element = conversion.element.unwrap();
        assert_eq!(element.widget_kind.as_deref(), Some("e-heading"));
        assert!(!element.settings.contains_key("title"));
        assert!(!element.settings.contains_key("header_size"));
        assert!(matches!(element.settings.get("link"), Some(TypedValue::Link(_))));

        let class_id = match element.settings.get(CLASSES_SETTING) {
            Some(TypedValue::Classes(ids)) => ids[0].clone(),
            other => panic!("expected classes, got {other:?}"),
        };
        let class = &element.styles[&class_id];
        assert_eq!(
            class.variants[0].props.get("color"),
            Some(&TypedValue::Color("#112233".into()))
        );
    }

    #[test]
    fn unset_values_are_skipped() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "b1", "elType": "widget", "widgetType": "button",
            "settings": { "text": "Go", "color": "", "width": null }
        })));
        assert!(conversion.is_clean());
        let element = conversion.element.unwrap();
        assert!(element.styles.is_empty());
        assert!(!element.settings.contains_key(CLASSES_SETTING));
    }

    #[test]
    fn image_size_lands_in_image() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "i1", "elType": "widget", "widgetType": "image",
            "settings": {
                "image_size": "large",
                "image": { "id": 7, "url": "https://cdn.test/i.png" }
            }
        })));
        assert!(conversion.is_clean());
        assert_eq!(
            conversion.element.unwrap().settings.get("image"),
            Some(&TypedValue::Image(Image {
                id: Some(7),
                url: "https://cdn.test/i.png".into(),
                size: "large".into(),
            }))
        );
    }

    #[test]
    fn image_size_without_image_is_reported() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "i2", "elType": "widget", "widgetType": "image",
            "settings": { "image_size": "large" }
        })));
        assert!(conversion.element.is_some());
        assert!(matches!(
            conversion.errors.as_slice(),
            [ConversionError::Unplaced { property, .. }] if property == "image_size"
        ));
    }

    #[test]
    fn editor_html_becomes_paragraph() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "t1", "elType": "widget", "widgetType": "text-editor",
            "settings": { "editor": "<p>Fresh &amp; local</p>" }
        })));
        let element = conversion.element.unwrap();
        assert_eq!(element.widget_kind.as_deref(), Some("e-paragraph"));
        assert_eq!(
            element.settings.get("paragraph"),
            Some(&TypedValue::String("Fresh & local".into()))
        );
    }

    #[test]
    fn failed_root_yields_no_element() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "s1", "elType": "section",
            "elements": [{ "id": "c1", "elType": "column" }]
        })));
        assert!(conversion.element.is_none());
        // Children of an unresolved element are never visited.
        assert_eq!(conversion.errors.len(), 1);
        assert_eq!(conversion.errors[0].element_id(), "s1");
        assert!(conversion.violations.is_empty());
    }

    #[test]
    fn later_source_key_wins_for_shared_prop() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "b2", "elType": "widget", "widgetType": "button",
            "settings": { "text_align": "left", "align": "right" }
        })));
        let element = conversion.element.unwrap();
        let class = element.styles.values().next().unwrap();
        assert_eq!(
            class.variants[0].props.get("text-align"),
            Some(&TypedValue::String("right".into()))
        );
    }

    #[test]
    fn encoding_error_carries_location() {
        let table = MappingTable::builtin();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "p1", "elType": "widget", "widgetType": "text-editor",
            "settings": { "text_color": "tomato", "editor": "Hi" }
        })));
        assert_eq!(
            conversion.errors,
            vec![ConversionError::Encoding {
                element_id: "p1".into(),
                property: "text_color".into(),
                source: EncodingError::Invalid(ValueError::NotHexColor("tomato".into())),
            }]
        );
        assert!(conversion.element.unwrap().settings.contains_key("paragraph"));
    }

    #[test]
    fn injected_table_is_used() {
        let table = MappingTable::empty();
        let conversion = Converter::new(&table).convert(&legacy(json!({
            "id": "h", "elType": "widget", "widgetType": "heading"
        })));
        assert!(conversion.element.is_none());
    }
}
