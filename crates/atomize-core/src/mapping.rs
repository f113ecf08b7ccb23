//! The property mapping table.
//!
//! For each legacy widget kind the table names the V4 widget type and, for
//! each legacy property, where the value lands and which tag it is encoded
//! as. The table is a plain value: build it with [`MappingTable::builtin`],
//! adjust it with [`MappingTable::merge`], and hand it to a
//! [`Converter`](crate::Converter) by reference.

use crate::html::strip_markup;
use crate::value::TypeTag;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Prefix every V4 widget type carries.
pub const WIDGET_PREFIX: &str = "e-";

/// Errors that can occur when loading or merging mapping overrides.
#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("failed to read mapping overrides: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse mapping overrides: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("new widget kind '{0}' needs a widget_type")]
    MissingWidgetType(String),

    #[error("widget type '{0}' must start with \"e-\"")]
    InvalidWidgetType(String),

    #[error("field target '{target}' must use tag `string`, not `{tag}`")]
    FieldTag { target: String, tag: TypeTag },

    #[error("invalid mapping target '{0}': expected styles.props.<name>, settings.<name>[.<field>] or discard")]
    InvalidTarget(String),
}

/// Where a mapped value lands in the V4 element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    /// A top-level entry of `settings`.
    Setting(String),
    /// A field inside an existing setting (e.g. the size of `settings.image`).
    SettingField { setting: String, field: String },
    /// A property of the element's local style class.
    Style(String),
    /// Consumed without a V4 slot.
    Discard,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setting(name) => write!(f, "settings.{name}"),
            Self::SettingField { setting, field } => write!(f, "settings.{setting}.{field}"),
            Self::Style(prop) => write!(f, "styles.props.{prop}"),
            Self::Discard => write!(f, "discard"),
        }
    }
}

impl std::str::FromStr for Target {
    type Err = OverrideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OverrideError::InvalidTarget(s.to_string());
        if s == "discard" {
            return Ok(Self::Discard);
        }
        if let Some(prop) = s.strip_prefix("styles.props.") {
            if prop.is_empty() || prop.contains('.') {
                return Err(invalid());
            }
            return Ok(Self::Style(prop.to_string()));
        }
        if let Some(path) = s.strip_prefix("settings.") {
            return match path.split('.').collect::<Vec<_>>().as_slice() {
                [name] if !name.is_empty() => Ok(Self::Setting((*name).to_string())),
                [setting, field] if !setting.is_empty() && !field.is_empty() => {
                    Ok(Self::SettingField {
                        setting: (*setting).to_string(),
                        field: (*field).to_string(),
                    })
                }
                _ => Err(invalid()),
            };
        }
        Err(invalid())
    }
}

impl TryFrom<String> for Target {
    type Error = OverrideError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.to_string()
    }
}

/// A value transform applied before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transform {
    /// Strip HTML markup and decode entities.
    StripMarkup,
}

/// How one legacy property maps into V4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyMapping {
    /// Destination of the value.
    pub target: Target,

    /// Tag the value is encoded as.
    pub tag: TypeTag,

    /// String values to rewrite before encoding. Unlisted values pass through.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub value_map: BTreeMap<String, String>,

    /// Transform applied before encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

impl PropertyMapping {
    /// A mapping into the element's style class.
    #[must_use]
    pub fn style(prop: &str, tag: TypeTag) -> Self {
        Self::new(Target::Style(prop.to_string()), tag)
    }

    /// A mapping into the element's settings.
    #[must_use]
    pub fn setting(name: &str, tag: TypeTag) -> Self {
        Self::new(Target::Setting(name.to_string()), tag)
    }

    /// A mapping into a field of an existing setting.
    #[must_use]
    pub fn setting_field(setting: &str, field: &str, tag: TypeTag) -> Self {
        Self::new(
            Target::SettingField {
                setting: setting.to_string(),
                field: field.to_string(),
            },
            tag,
        )
    }

    /// A property consumed without a V4 slot.
    #[must_use]
    pub fn discard() -> Self {
        Self::new(Target::Discard, TypeTag::String)
    }

    fn new(target: Target, tag: TypeTag) -> Self {
        Self {
            target,
            tag,
            value_map: BTreeMap::new(),
            transform: None,
        }
    }

    /// Rewrite `from` to `to` before encoding.
    #[must_use]
    pub fn map_value(mut self, from: &str, to: &str) -> Self {
        self.value_map.insert(from.to_string(), to.to_string());
        self
    }

    /// Apply `transform` before encoding.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Apply the value map and transform to a raw legacy value.
    #[must_use]
    pub fn prepare<'a>(&self, raw: &'a Value) -> Cow<'a, Value> {
        let Value::String(text) = raw else {
            return Cow::Borrowed(raw);
        };
        let mapped = self.value_map.get(text).map_or(text.as_str(), String::as_str);
        let prepared = match self.transform {
            Some(Transform::StripMarkup) => strip_markup(mapped),
            None if mapped == text.as_str() => return Cow::Borrowed(raw),
            None => mapped.to_string(),
        };
        Cow::Owned(Value::String(prepared))
    }
}

/// The mappings of one legacy widget kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetMapping {
    /// V4 widget type, always `e-` prefixed.
    pub widget_type: String,

    /// Mappings keyed by legacy property name.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyMapping>,
}

impl WidgetMapping {
    #[must_use]
    pub fn new(widget_type: &str) -> Self {
        Self {
            widget_type: widget_type.to_string(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, property: &str, mapping: PropertyMapping) -> Self {
        self.properties.insert(property.to_string(), mapping);
        self
    }
}

/// Per-widget-kind property mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTable {
    /// Mappings keyed by legacy widget kind.
    pub widgets: BTreeMap<String, WidgetMapping>,
}

impl MappingTable {
    /// An empty table. Every element fails kind resolution against it.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            widgets: BTreeMap::new(),
        }
    }

    /// The built-in legacy to V4 mappings.
    #[must_use]
    pub fn builtin() -> Self {
        use PropertyMapping as M;
        use TypeTag as T;

        let heading = WidgetMapping::new("e-heading")
            .with("title", M::discard())
            .with("typography_font_family", M::style("font-family", T::String))
            .with("typography_font_size", M::style("font-size", T::Size))
            .with("typography_font_weight", M::style("font-weight", T::String))
            .with("typography_font_style", M::style("font-style", T::String))
            .with("title_color", M::style("color", T::Color))
            .with("align", M::style("text-align", T::String))
            .with("link", M::setting("link", T::Link));

        let button = WidgetMapping::new("e-button")
            .with("text", M::setting("text", T::String))
            .with("background_color", M::style("background", T::Background))
            .with("button_box_shadow_box_shadow", M::style("box-shadow", T::Shadow))
            .with("width", M::style("width", T::Size))
            .with("height", M::style("height", T::Size))
            .with("color", M::style("color", T::Color))
            .with("text_align", M::style("text-align", T::String))
            .with("align", M::style("text-align", T::String))
            .with("typography_font_family", M::style("font-family", T::String))
            .with("typography_font_size", M::style("font-size", T::Size))
            .with("typography_font_weight", M::style("font-weight", T::String))
            .with("_margin", M::style("margin", T::Spacing))
            .with("_padding", M::style("padding", T::Spacing))
            .with("_element_width", M::style("width", T::Size))
            .with("_element_custom_width", M::style("width", T::Size))
            .with("_flex_align_self", M::style("align-self", T::String))
            .with("link", M::setting("link", T::Link));

        let image = WidgetMapping::new("e-image")
            .with("image", M::setting("image", T::Image))
            .with("image_size", M::setting_field("image", "size", T::String))
            .with("image_border_border", M::style("border-style", T::String))
            .with("image_border_width", M::style("border-width", T::Size))
            .with("image_border_color", M::style("border-color", T::Color))
            .with("align", M::style("align-self", T::String));

        let text_editor = WidgetMapping::new("e-paragraph")
            .with(
                "editor",
                M::setting("paragraph", T::String).with_transform(Transform::StripMarkup),
            )
            .with("typography_font_family", M::style("font-family", T::String))
            .with("typography_font_weight", M::style("font-weight", T::String))
            .with("typography_font_style", M::style("font-style", T::String))
            .with("text_color", M::style("color", T::Color));

        let container = WidgetMapping::new("e-flexbox")
            .with(
                "content_width",
                M::style("flex-direction", T::String).map_value("full", "column"),
            )
            .with("flex_direction", M::style("flex-direction", T::String))
            .with("justify_content", M::style("justify-content", T::String))
            .with("align_items", M::style("align-items", T::String))
            .with("gap", M::style("gap", T::Size))
            .with("padding", M::style("padding", T::Spacing))
            .with("margin", M::style("margin", T::Spacing))
            .with("background_color", M::style("background", T::Background));

        let mut widgets = BTreeMap::new();
        widgets.insert("heading".to_string(), heading);
        widgets.insert("button".to_string(), button);
        widgets.insert("image".to_string(), image);
        widgets.insert("text-editor".to_string(), text_editor);
        widgets.insert("container".to_string(), container);
        Self { widgets }
    }

    /// The mappings for a legacy widget kind.
    #[must_use]
    pub fn widget(&self, kind: &str) -> Option<&WidgetMapping> {
        self.widgets.get(kind)
    }

    /// The V4 widget type for a legacy widget kind.
    #[must_use]
    pub fn resolve_kind(&self, kind: &str) -> Option<&str> {
        self.widget(kind).map(|w| w.widget_type.as_str())
    }

    /// The mapping for one legacy property of a widget kind.
    #[must_use]
    pub fn lookup(&self, kind: &str, property: &str) -> Option<&PropertyMapping> {
        self.widget(kind)?.properties.get(property)
    }

    /// Apply overrides on top of this table.
    ///
    /// Property entries replace existing ones of the same name; new widget
    /// kinds must name their V4 widget type. On error the table is left
    /// unchanged.
    pub fn merge(&mut self, overrides: MappingOverrides) -> Result<(), OverrideError> {
        let mut merged = self.widgets.clone();
        for (kind, entry) in overrides.widgets {
            if let Some(widget_type) = &entry.widget_type {
                if !widget_type.starts_with(WIDGET_PREFIX) {
                    return Err(OverrideError::InvalidWidgetType(widget_type.clone()));
                }
            }
            for mapping in entry.properties.values() {
                // Field targets patch string fields only.
                if matches!(mapping.target, Target::SettingField { .. })
                    && mapping.tag != TypeTag::String
                {
                    return Err(OverrideError::FieldTag {
                        target: mapping.target.to_string(),
                        tag: mapping.tag,
                    });
                }
            }
            match merged.get_mut(&kind) {
                Some(existing) => {
                    if let Some(widget_type) = entry.widget_type {
                        existing.widget_type = widget_type;
                    }
                    existing.properties.extend(entry.properties);
                }
                None => {
                    let widget_type = entry
                        .widget_type
                        .ok_or_else(|| OverrideError::MissingWidgetType(kind.clone()))?;
                    merged.insert(
                        kind,
                        WidgetMapping {
                            widget_type,
                            properties: entry.properties,
                        },
                    );
                }
            }
        }
        self.widgets = merged;
        Ok(())
    }

    /// Serialize the table as TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Partial mapping entries for one widget kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WidgetOverride {
    /// Replacement V4 widget type. Required for new kinds.
    #[serde(default)]
    pub widget_type: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, PropertyMapping>,
}

/// Mapping overrides as read from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingOverrides {
    #[serde(default)]
    pub widgets: BTreeMap<String, WidgetOverride>,
}

impl MappingOverrides {
    /// Load overrides from a file path.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OverrideError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse overrides from a TOML string.
    pub fn parse(content: &str) -> Result<Self, OverrideError> {
        Ok(toml::from_str(content)?)
    }

    /// Returns true if there is nothing to merge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_renames() {
        let table = MappingTable::builtin();
        assert_eq!(table.resolve_kind("heading"), Some("e-heading"));
        assert_eq!(table.resolve_kind("button"), Some("e-button"));
        assert_eq!(table.resolve_kind("image"), Some("e-image"));
        assert_eq!(table.resolve_kind("text-editor"), Some("e-paragraph"));
        assert_eq!(table.resolve_kind("container"), Some("e-flexbox"));
        assert_eq!(table.resolve_kind("section"), None);
    }

    #[test]
    fn every_builtin_type_has_prefix() {
        for widget in MappingTable::builtin().widgets.values() {
            assert!(widget.widget_type.starts_with(WIDGET_PREFIX));
        }
    }

    #[test]
    fn lookup_is_per_kind() {
        let table = MappingTable::builtin();
        assert_eq!(
            table.lookup("heading", "align").map(|m| &m.target),
            Some(&Target::Style("text-align".into()))
        );
        assert_eq!(
            table.lookup("image", "align").map(|m| &m.target),
            Some(&Target::Style("align-self".into()))
        );
        assert!(table.lookup("heading", "editor").is_none());
        assert!(table.lookup("nope", "title").is_none());
    }

    #[test]
    fn target_paths() {
        assert_eq!("styles.props.gap".parse::<Target>().unwrap(), Target::Style("gap".into()));
        assert_eq!("settings.link".parse::<Target>().unwrap(), Target::Setting("link".into()));
        assert_eq!(
            "settings.image.size".parse::<Target>().unwrap(),
            Target::SettingField {
                setting: "image".into(),
                field: "size".into()
            }
        );
        assert!("styles.gap".parse::<Target>().is_err());
        assert!("settings.".parse::<Target>().is_err());
    }

    #[test]
    fn value_map_redirects() {
        let table = MappingTable::builtin();
        let mapping = table.lookup("container", "content_width").unwrap();
        assert_eq!(*mapping.prepare(&json!("full")), json!("column"));
        assert_eq!(*mapping.prepare(&json!("boxed")), json!("boxed"));
    }

    #[test]
    fn strip_markup_transform() {
        let table = MappingTable::builtin();
        let mapping = table.lookup("text-editor", "editor").unwrap();
        assert_eq!(
            *mapping.prepare(&json!("<p>Fish &amp; chips</p>")),
            json!("Fish & chips")
        );
    }

    #[test]
    fn merge_overrides() {
        let overrides = MappingOverrides::parse(
            r#"
[widgets.heading.properties.typography_line_height]
target = "styles.props.line-height"
tag = "size"

[widgets.divider]
widget_type = "e-divider"

[widgets.divider.properties.color]
target = "styles.props.border-color"
tag = "color"
"#,
        )
        .unwrap();

        let mut table = MappingTable::builtin();
        table.merge(overrides).unwrap();

        assert_eq!(table.resolve_kind("divider"), Some("e-divider"));
        assert_eq!(
            table.lookup("heading", "typography_line_height").map(|m| m.tag),
            Some(TypeTag::Size)
        );
        // Existing entries survive.
        assert!(table.lookup("heading", "title_color").is_some());
    }

    #[test]
    fn merge_rejects_unprefixed_type() {
        let overrides = MappingOverrides::parse(
            r#"
[widgets.divider]
widget_type = "divider"
"#,
        )
        .unwrap();
        let err = MappingTable::builtin().merge(overrides).unwrap_err();
        assert!(matches!(err, OverrideError::InvalidWidgetType(..)));
    }

    #[test]
    fn merge_requires_type_for_new_kind() {
        let overrides = MappingOverrides::parse(
            r#"
[widgets.divider.properties.color]
target = "styles.props.border-color"
tag = "color"
"#,
        )
        .unwrap();
        let err = MappingTable::builtin().merge(overrides).unwrap_err();
        assert!(matches!(err, OverrideError::MissingWidgetType(kind) if kind == "divider"));
    }

    #[test]
    fn failed_merge_leaves_table_unchanged() {
        // `heading` sorts before `zzz`, so it is visited first.
        let overrides = MappingOverrides::parse(
            r#"
[widgets.heading]
widget_type = "e-title"

[widgets.zzz.properties.color]
target = "styles.props.color"
tag = "color"
"#,
        )
        .unwrap();
        let mut table = MappingTable::builtin();
        assert!(table.merge(overrides).is_err());
        assert_eq!(table, MappingTable::builtin());
        assert_eq!(table.resolve_kind("heading"), Some("e-heading"));
    }

    #[test]
    fn field_targets_must_be_strings() {
        let overrides = MappingOverrides::parse(
            r#"
[widgets.button.properties.link_text]
target = "settings.link.label"
tag = "url"
"#,
        )
        .unwrap();
        let mut table = MappingTable::builtin();
        let err = table.merge(overrides).unwrap_err();
        assert!(matches!(err, OverrideError::FieldTag { tag: TypeTag::Url, .. }));
        assert_eq!(table, MappingTable::builtin());
    }

    #[test]
    fn bad_target_fails_parse() {
        let err = MappingOverrides::parse(
            r#"
[widgets.heading.properties.title]
target = "elsewhere"
tag = "string"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, OverrideError::Parse(..)));
    }

    #[test]
    fn table_survives_toml() {
        let table = MappingTable::builtin();
        let text = table.to_toml_string().unwrap();
        let back: MappingTable = toml::from_str(&text).unwrap();
        assert_eq!(back, table);
    }
}
