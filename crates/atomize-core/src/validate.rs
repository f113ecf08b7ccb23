//! Structural validation of V4 trees.
//!
//! Checks are collected, not fail-fast: every violation in the tree is
//! reported with the path where it was found. [`validate_element`] checks
//! a typed tree; [`validate_json`] checks raw JSON, such as the output of
//! an external conversion provider, where fields may be missing or of the
//! wrong JSON type.

use crate::element::{Element, ElementKind};
use crate::mapping::WIDGET_PREFIX;
use crate::style::{StyleClass, CLASS_KIND, LOCAL_LABEL};
use crate::value::{TypedValue, ValueError, TYPE_KEY};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// What is wrong at a location.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralErrorKind {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("`{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("widget type '{0}' does not start with \"e-\"")]
    WidgetKindPrefix(String),

    #[error("value is not a tagged value")]
    Untagged,

    #[error("invalid `{tag}` value: {source}")]
    InvalidValue { tag: String, source: ValueError },

    #[error("style class id cannot be empty")]
    EmptyClassId,

    #[error("style class is stored under '{key}' but its id is '{id}'")]
    ClassKeyMismatch { key: String, id: String },

    #[error("style class id '{0}' is used more than once")]
    DuplicateClassId(String),

    #[error("style class label must be \"local\", found '{0}'")]
    ClassLabel(String),

    #[error("style class type must be \"class\", found '{0}'")]
    ClassKind(String),

    #[error("style class has no variants")]
    NoVariants,
}

/// A violation and where it was found.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{path}: {kind}")]
pub struct StructuralError {
    /// Location, e.g. `content[0].elements[1].settings.link`.
    pub path: String,
    pub kind: StructuralErrorKind,
}

/// Validate a typed V4 tree rooted at `element`.
#[must_use]
pub fn validate_element(element: &Element) -> Vec<StructuralError> {
    let mut walker = Walker::default();
    walker.element(element, &Path::root("$"));
    walker.errors
}

/// Validate the top-level elements of a typed document.
#[must_use]
pub fn validate_elements(elements: &[Element]) -> Vec<StructuralError> {
    let mut walker = Walker::default();
    for (i, element) in elements.iter().enumerate() {
        walker.element(element, &Path::root("content").index(i));
    }
    walker.errors
}

/// Validate a raw V4 element.
#[must_use]
pub fn validate_json(element: &Value) -> Vec<StructuralError> {
    let mut walker = Walker::default();
    walker.json_element(element, &Path::root("$"));
    walker.errors
}

/// Validate a raw V4 document envelope and its elements.
#[must_use]
pub fn validate_document_json(document: &Value) -> Vec<StructuralError> {
    let mut walker = Walker::default();
    let root = Path::root("$");
    let Some(object) = document.as_object() else {
        walker.push(&root, StructuralErrorKind::WrongType { field: "document", expected: "an object" });
        return walker.errors;
    };
    for (field, expected) in [("version", "a string"), ("type", "a string")] {
        match object.get(field) {
            None => walker.push(&root, StructuralErrorKind::MissingField(field)),
            Some(Value::String(_)) => {}
            Some(_) => walker.push(&root, StructuralErrorKind::WrongType { field, expected }),
        }
    }
    match object.get("content") {
        None => walker.push(&root, StructuralErrorKind::MissingField("content")),
        Some(Value::Array(elements)) => {
            for (i, element) in elements.iter().enumerate() {
                walker.json_element(element, &Path::root("content").index(i));
            }
        }
        Some(_) => walker.push(
            &root,
            StructuralErrorKind::WrongType { field: "content", expected: "an array" },
        ),
    }
    walker.errors
}

/// Dotted location inside a tree.
#[derive(Debug, Clone)]
struct Path(String);

impl Path {
    fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    fn field(&self, name: &str) -> Self {
        Self(format!("{}.{name}", self.0))
    }

    fn index(&self, i: usize) -> Self {
        Self(format!("{}[{i}]", self.0))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Default)]
struct Walker {
    errors: Vec<StructuralError>,
    class_ids: HashSet<String>,
}

impl Walker {
    fn push(&mut self, path: &Path, kind: StructuralErrorKind) {
        self.errors.push(StructuralError {
            path: path.to_string(),
            kind,
        });
    }

    fn widget_prefix(&mut self, path: &Path, widget_kind: &str) {
        if !widget_kind.starts_with(WIDGET_PREFIX) {
            self.push(
                &path.field("widgetType"),
                StructuralErrorKind::WidgetKindPrefix(widget_kind.to_string()),
            );
        }
    }

    fn typed_value(&mut self, path: &Path, value: &TypedValue) {
        if let Err(source) = value.validate() {
            self.push(
                path,
                StructuralErrorKind::InvalidValue {
                    tag: value.tag().to_string(),
                    source,
                },
            );
        }
    }

    fn class_header(&mut self, path: &Path, key: &str, id: &str, label: &str, kind: &str) {
        if id.is_empty() {
            self.push(path, StructuralErrorKind::EmptyClassId);
        } else {
            if id != key {
                self.push(
                    path,
                    StructuralErrorKind::ClassKeyMismatch {
                        key: key.to_string(),
                        id: id.to_string(),
                    },
                );
            }
            if !self.class_ids.insert(id.to_string()) {
                self.push(path, StructuralErrorKind::DuplicateClassId(id.to_string()));
            }
        }
        if label != LOCAL_LABEL {
            self.push(path, StructuralErrorKind::ClassLabel(label.to_string()));
        }
        if kind != CLASS_KIND {
            self.push(path, StructuralErrorKind::ClassKind(kind.to_string()));
        }
    }

    // Typed trees.

    fn element(&mut self, element: &Element, path: &Path) {
        if element.id.is_empty() {
            self.push(path, StructuralErrorKind::MissingField("id"));
        }
        if element.version.is_empty() {
            self.push(path, StructuralErrorKind::MissingField("version"));
        }
        match (&element.widget_kind, element.kind) {
            (None, ElementKind::Widget) => {
                self.push(path, StructuralErrorKind::MissingField("widgetType"));
            }
            (Some(widget_kind), _) => self.widget_prefix(path, widget_kind),
            (None, ElementKind::Container) => {}
        }

        let settings = path.field("settings");
        for (name, value) in &element.settings {
            self.typed_value(&settings.field(name), value);
        }

        let styles = path.field("styles");
        for (key, class) in &element.styles {
            self.style_class(&styles.field(key), key, class);
        }

        let children = path.field("elements");
        for (i, child) in element.children.iter().enumerate() {
            self.element(child, &children.index(i));
        }
    }

    fn style_class(&mut self, path: &Path, key: &str, class: &StyleClass) {
        self.class_header(path, key, &class.id, &class.label, &class.kind);
        if class.variants.is_empty() {
            self.push(path, StructuralErrorKind::NoVariants);
        }
        let variants = path.field("variants");
        for (i, variant) in class.variants.iter().enumerate() {
            let props = variants.index(i).field("props");
            for (name, value) in &variant.props {
                self.typed_value(&props.field(name), value);
            }
        }
    }

    // Raw JSON trees.

    fn json_element(&mut self, element: &Value, path: &Path) {
        let Some(object) = element.as_object() else {
            self.push(path, StructuralErrorKind::WrongType { field: "element", expected: "an object" });
            return;
        };

        let id = self.required(object, path, "id", Value::as_str, "a string");
        if id == Some("") {
            self.push(path, StructuralErrorKind::MissingField("id"));
        }
        let settings = self.required(object, path, "settings", map_like, "an object");
        let children = self.required(object, path, "elements", Value::as_array, "an array");
        self.required(object, path, "isInner", Value::as_bool, "a boolean");
        let kind = self.required(object, path, "elType", Value::as_str, "a string");
        let styles = self.required(object, path, "styles", map_like, "an object");
        self.required(object, path, "version", Value::as_str, "a string");

        match object.get("widgetType") {
            Some(Value::String(widget_kind)) => self.widget_prefix(path, widget_kind),
            Some(_) => self.push(
                path,
                StructuralErrorKind::WrongType { field: "widgetType", expected: "a string" },
            ),
            None if kind == Some("widget") => {
                self.push(path, StructuralErrorKind::MissingField("widgetType"));
            }
            None => {}
        }

        if let Some(settings) = settings {
            let base = path.field("settings");
            for (name, value) in settings {
                self.json_value(&base.field(name), value);
            }
        }

        if let Some(styles) = styles {
            let base = path.field("styles");
            for (key, class) in styles {
                self.json_style_class(&base.field(key), key, class);
            }
        }

        if let Some(children) = children {
            let base = path.field("elements");
            for (i, child) in children.iter().enumerate() {
                self.json_element(child, &base.index(i));
            }
        }
    }

    /// Look up a required field, reporting absence or a wrong JSON type.
    fn required<'v, T>(
        &mut self,
        object: &'v Map<String, Value>,
        path: &Path,
        field: &'static str,
        read: impl Fn(&'v Value) -> Option<T>,
        expected: &'static str,
    ) -> Option<T> {
        let Some(value) = object.get(field) else {
            self.push(path, StructuralErrorKind::MissingField(field));
            return None;
        };
        let read = read(value);
        if read.is_none() {
            self.push(path, StructuralErrorKind::WrongType { field, expected });
        }
        read
    }

    fn json_value(&mut self, path: &Path, value: &Value) {
        let tagged = value.as_object().is_some_and(|o| o.contains_key(TYPE_KEY));
        if !tagged {
            self.push(path, StructuralErrorKind::Untagged);
            return;
        }
        match TypedValue::from_json(value) {
            Ok(typed) => self.typed_value(path, &typed),
            Err(source) => {
                let tag = value
                    .get(TYPE_KEY)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.push(path, StructuralErrorKind::InvalidValue { tag, source });
            }
        }
    }

    fn json_style_class(&mut self, path: &Path, key: &str, class: &Value) {
        let Some(object) = class.as_object() else {
            self.push(path, StructuralErrorKind::WrongType { field: "style class", expected: "an object" });
            return;
        };

        let id = self.required(object, path, "id", Value::as_str, "a string");
        let label = self.required(object, path, "label", Value::as_str, "a string");
        let kind = self.required(object, path, "type", Value::as_str, "a string");
        let variants = self.required(object, path, "variants", Value::as_array, "an array");
        if let (Some(id), Some(label), Some(kind)) = (id, label, kind) {
            self.class_header(path, key, id, label, kind);
        }

        let Some(variants) = variants else {
            return;
        };
        if variants.is_empty() {
            self.push(path, StructuralErrorKind::NoVariants);
        }
        let base = path.field("variants");
        for (i, variant) in variants.iter().enumerate() {
            let variant_path = base.index(i);
            let Some(variant) = variant.as_object() else {
                self.push(
                    &variant_path,
                    StructuralErrorKind::WrongType { field: "variant", expected: "an object" },
                );
                continue;
            };
            self.required(variant, &variant_path, "meta", Value::as_object, "an object");
            let props = self.required(variant, &variant_path, "props", map_like, "an object");
            if let Some(props) = props {
                let props_path = variant_path.field("props");
                for (name, value) in props {
                    self.json_value(&props_path.field(name), value);
                }
            }
        }
    }
}

/// An object, or the empty array PHP writes for an empty map.
fn map_like(value: &Value) -> Option<Vec<(&String, &Value)>> {
    match value {
        Value::Object(object) => Some(object.iter().collect()),
        Value::Array(items) if items.is_empty() => Some(Vec::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::META_VERSION;
    use crate::style::StyleClass;
    use crate::value::Size;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn widget(id: &str, widget_kind: &str) -> Element {
        Element {
            id: id.into(),
            kind: ElementKind::Widget,
            widget_kind: Some(widget_kind.into()),
            settings: BTreeMap::new(),
            children: Vec::new(),
            is_inner: false,
            styles: BTreeMap::new(),
            editor_settings: Map::new(),
            version: META_VERSION.into(),
        }
    }

    #[test]
    fn clean_typed_tree() {
        let mut root = widget("r", "e-flexbox");
        root.kind = ElementKind::Container;
        root.children.push(widget("a", "e-heading"));
        assert!(validate_element(&root).is_empty());
    }

    #[test]
    fn collects_every_violation() {
        let mut root = widget("r", "flexbox");
        root.kind = ElementKind::Container;
        let mut child = widget("a", "heading");
        child
            .settings
            .insert("color".into(), TypedValue::Color("red".into()));
        root.children.push(child);
        let mut orphan = widget("b", "e-heading");
        orphan.widget_kind = None;
        root.children.push(orphan);

        let errors = validate_element(&root);
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0].path, "$.widgetType");
        assert!(matches!(errors[0].kind, StructuralErrorKind::WidgetKindPrefix(_)));
        assert_eq!(errors[1].path, "$.elements[0].widgetType");
        assert_eq!(errors[2].path, "$.elements[0].settings.color");
        assert!(matches!(
            &errors[2].kind,
            StructuralErrorKind::InvalidValue { tag, source: ValueError::NotHexColor(_) } if tag == "color"
        ));
        assert_eq!(
            errors[3],
            StructuralError {
                path: "$.elements[1]".into(),
                kind: StructuralErrorKind::MissingField("widgetType"),
            }
        );
    }

    #[test]
    fn style_class_checks() {
        let mut element = widget("a", "e-heading");
        let mut props = BTreeMap::new();
        props.insert("gap".to_string(), TypedValue::Size(Size { unit: "px".into(), size: 4.0 }));
        let mut class = StyleClass::local("e-a-1".into(), props);
        class.label = "global".into();
        element.styles.insert("e-a-2".into(), class.clone());
        class.variants.clear();
        element.styles.insert("e-a-1".into(), class);

        let kinds: Vec<_> = validate_element(&element).into_iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&StructuralErrorKind::ClassLabel("global".into())));
        assert!(kinds.contains(&StructuralErrorKind::NoVariants));
        assert!(kinds.contains(&StructuralErrorKind::DuplicateClassId("e-a-1".into())));
        assert!(kinds.contains(&StructuralErrorKind::ClassKeyMismatch {
            key: "e-a-2".into(),
            id: "e-a-1".into()
        }));
    }

    #[test]
    fn json_missing_fields() {
        let errors = validate_json(&json!({ "id": "x", "elType": "widget" }));
        let missing: Vec<_> = errors
            .iter()
            .filter_map(|e| match e.kind {
                StructuralErrorKind::MissingField(field) => Some(field),
                _ => None,
            })
            .collect();
        assert_eq!(
            missing,
            ["settings", "elements", "isInner", "styles", "version", "widgetType"]
        );
    }

    #[test]
    fn json_wrong_types_and_untagged_values() {
        let errors = validate_json(&json!({
            "id": "x", "elType": "widget", "widgetType": "e-button",
            "settings": { "text": "Click", "link": { "$$type": "link", "value": {} } },
            "elements": {}, "isInner": "no", "styles": [], "version": "0.0"
        }));
        assert!(errors.contains(&StructuralError {
            path: "$".into(),
            kind: StructuralErrorKind::WrongType { field: "elements", expected: "an array" },
        }));
        assert!(errors.contains(&StructuralError {
            path: "$".into(),
            kind: StructuralErrorKind::WrongType { field: "isInner", expected: "a boolean" },
        }));
        assert!(errors.contains(&StructuralError {
            path: "$.settings.text".into(),
            kind: StructuralErrorKind::Untagged,
        }));
        assert!(errors
            .iter()
            .any(|e| e.path == "$.settings.link"
                && matches!(&e.kind, StructuralErrorKind::InvalidValue { tag, .. } if tag == "link")));
    }

    #[test]
    fn json_style_classes() {
        let errors = validate_json(&json!({
            "id": "x", "elType": "widget", "widgetType": "e-heading",
            "settings": { "classes": { "$$type": "classes", "value": ["e-x-1"] } },
            "elements": [], "isInner": false, "version": "0.0",
            "styles": {
                "e-x-1": {
                    "id": "e-x-1", "label": "local", "type": "class",
                    "variants": [
                        { "meta": { "breakpoint": "desktop", "state": null },
                          "props": { "color": { "$$type": "color", "value": "#zzzzzz" } } },
                        { "props": [] }
                    ]
                }
            }
        }));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path, "$.styles.e-x-1.variants[0].props.color");
        assert_eq!(
            errors[1],
            StructuralError {
                path: "$.styles.e-x-1.variants[1]".into(),
                kind: StructuralErrorKind::MissingField("meta"),
            }
        );
    }

    #[test]
    fn unknown_tags_pass() {
        let errors = validate_json(&json!({
            "id": "x", "elType": "container", "settings": {
                "attributes": { "$$type": "key-value-array", "value": [] }
            },
            "elements": [], "isInner": false, "styles": {}, "version": "0.0"
        }));
        assert!(errors.is_empty());
    }

    #[test]
    fn json_nested_tags_must_match() {
        let errors = validate_json(&json!({
            "id": "i", "elType": "widget", "widgetType": "e-image",
            "settings": {
                "image": {
                    "$$type": "image",
                    "value": {
                        "src": {
                            "$$type": "color",
                            "value": { "url": { "$$type": "url", "value": "https://cdn.test/a.png" } }
                        }
                    }
                },
                "background": {
                    "$$type": "background",
                    "value": {
                        "background-overlay": { "$$type": "string", "value": [] }
                    }
                }
            },
            "elements": [], "isInner": false, "styles": {}, "version": "0.0"
        }));
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["$.settings.image", "$.settings.background"]);
        assert!(errors.iter().all(|e| matches!(
            &e.kind,
            StructuralErrorKind::InvalidValue { source: ValueError::Nested { .. }, .. }
        )));
    }

    #[test]
    fn document_envelope() {
        let errors = validate_document_json(&json!({ "content": {} }));
        assert_eq!(
            errors.iter().map(|e| e.kind.clone()).collect::<Vec<_>>(),
            vec![
                StructuralErrorKind::MissingField("version"),
                StructuralErrorKind::MissingField("type"),
                StructuralErrorKind::WrongType { field: "content", expected: "an array" },
            ]
        );

        let errors = validate_document_json(&json!({
            "content": [{ "id": "", "elType": "container", "settings": {}, "elements": [],
                          "isInner": false, "styles": {}, "version": "0.0" }],
            "version": "0.4", "type": "container"
        }));
        assert_eq!(
            errors,
            vec![StructuralError {
                path: "content[0]".into(),
                kind: StructuralErrorKind::MissingField("id"),
            }]
        );
    }
}
