//! Schema-driven conversion of legacy (V3) page-builder trees into the
//! atomic (V4) element schema.
//!
//! This crate provides:
//! - Typed V4 values with per-tag invariants
//! - Encoding of raw legacy setting values into typed values
//! - A data-driven property mapping table with TOML overrides
//! - Local style class synthesis with run-unique class ids
//! - A recursive, best-effort tree converter
//! - A structural validator for V4 trees, typed or raw JSON

mod convert;
mod element;
mod encode;
mod html;
mod mapping;
mod style;
mod validate;
mod value;

pub use convert::{
    Conversion, ConversionError, Converter, DocumentConversion, MappingError, CLASSES_SETTING,
};
pub use element::{
    Document, Element, ElementKind, InputError, LegacyDocument, LegacyElement, DOCUMENT_TYPE,
    DOCUMENT_VERSION, META_VERSION,
};
pub use encode::{encode, json_kind, normalize_url, EncodingError};
pub use html::{decode_entities, strip_markup};
pub use mapping::{
    MappingOverrides, MappingTable, OverrideError, PropertyMapping, Target, Transform,
    WidgetMapping, WidgetOverride, WIDGET_PREFIX,
};
pub use style::{
    ClassRegistry, StyleClass, Variant, VariantMeta, CLASS_KIND, DESKTOP, LOCAL_LABEL,
};
pub use validate::{
    validate_document_json, validate_element, validate_elements, validate_json,
    StructuralError, StructuralErrorKind,
};
pub use value::{
    is_hex_color, Background, Image, Link, Shadow, Size, TypeTag, TypedValue, ValueError,
    DEFAULT_IMAGE_SIZE, TYPE_KEY, VALUE_KEY,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
