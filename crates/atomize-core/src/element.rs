//! Legacy (V3) and target (V4) element trees.

use crate::style::StyleClass;
use crate::value::TypedValue;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Version marker stamped on every V4 element.
pub const META_VERSION: &str = "0.0";

/// Envelope version of legacy clipboard documents.
pub const DOCUMENT_VERSION: &str = "0.4";

/// Envelope type of legacy clipboard documents.
pub const DOCUMENT_TYPE: &str = "container";

/// Errors for input trees that cannot be read at all.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input tree: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input is neither an element nor a document with `content`")]
    NotADocument,
}

/// PHP-serialized editors write empty maps as `[]`. Accept both.
fn map_or_empty_array<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) if items.is_empty() => Ok(T::default()),
        Value::Null => Ok(T::default()),
        other => serde_json::from_value(other).map_err(de::Error::custom),
    }
}

/// An element of a legacy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyElement {
    pub id: String,

    /// `container` or `widget`.
    pub el_type: String,

    /// Widget kind (`heading`, `button`, ...) for widgets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,

    /// Flat legacy settings, in source order.
    #[serde(default, deserialize_with = "map_or_empty_array")]
    pub settings: Map<String, Value>,

    #[serde(default)]
    pub elements: Vec<LegacyElement>,

    #[serde(default)]
    pub is_inner: bool,
}

impl LegacyElement {
    /// The key used to resolve this element in the mapping table.
    #[must_use]
    pub fn kind_key(&self) -> &str {
        self.widget_type.as_deref().unwrap_or(&self.el_type)
    }

    /// Returns true for widget elements.
    #[must_use]
    pub fn is_widget(&self) -> bool {
        self.el_type == "widget"
    }

    /// Number of elements in this subtree, including this one.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.elements.iter().map(Self::subtree_len).sum::<usize>()
    }
}

/// A legacy clipboard document: top-level elements plus envelope metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDocument {
    pub content: Vec<LegacyElement>,

    #[serde(default = "default_document_version")]
    pub version: String,

    #[serde(default = "default_document_type", rename = "type")]
    pub kind: String,
}

fn default_document_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn default_document_type() -> String {
    DOCUMENT_TYPE.to_string()
}

impl LegacyDocument {
    /// Wrap a single element in a document envelope.
    #[must_use]
    pub fn from_element(element: LegacyElement) -> Self {
        Self {
            content: vec![element],
            version: default_document_version(),
            kind: default_document_type(),
        }
    }

    /// Load a document from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a document from JSON text.
    ///
    /// A bare element object is accepted as a one-element document.
    pub fn parse(content: &str) -> Result<Self, InputError> {
        let json: Value = serde_json::from_str(content)?;
        Self::from_value(json)
    }

    /// Read a document from an already decoded JSON value.
    pub fn from_value(json: Value) -> Result<Self, InputError> {
        let Some(object) = json.as_object() else {
            return Err(InputError::NotADocument);
        };
        if object.contains_key("content") {
            Ok(serde_json::from_value(json)?)
        } else if object.contains_key("elType") {
            Ok(Self::from_element(serde_json::from_value(json)?))
        } else {
            Err(InputError::NotADocument)
        }
    }
}

/// Element kind of a V4 element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Container,
    Widget,
}

/// An element of a V4 document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Copied verbatim from the legacy element.
    pub id: String,

    #[serde(rename = "elType")]
    pub kind: ElementKind,

    /// `e-` prefixed V4 widget type.
    #[serde(rename = "widgetType", default, skip_serializing_if = "Option::is_none")]
    pub widget_kind: Option<String>,

    #[serde(default, deserialize_with = "map_or_empty_array")]
    pub settings: BTreeMap<String, TypedValue>,

    #[serde(rename = "elements", default)]
    pub children: Vec<Element>,

    #[serde(rename = "isInner", default)]
    pub is_inner: bool,

    /// Local style classes keyed by class id.
    #[serde(default, deserialize_with = "map_or_empty_array")]
    pub styles: BTreeMap<String, StyleClass>,

    #[serde(default, deserialize_with = "map_or_empty_array")]
    pub editor_settings: Map<String, Value>,

    pub version: String,
}

impl Element {
    /// Visit this element and all descendants, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Number of elements in this subtree, including this one.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_len).sum::<usize>()
    }
}

/// A V4 document envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: Vec<Element>,

    pub version: String,

    #[serde(rename = "type")]
    pub kind: String,
}
