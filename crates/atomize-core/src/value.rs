//! Tagged values of the V4 schema.
//!
//! Every V4 setting and style property is a `{"$$type": tag, "value": payload}`
//! object. [`TypedValue`] is the closed set of tags this crate understands,
//! plus an opaque [`TypedValue::Other`] for tags it does not.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Key holding the tag of a V4 tagged value.
pub const TYPE_KEY: &str = "$$type";

/// Key holding the payload of a V4 tagged value.
pub const VALUE_KEY: &str = "value";

/// Errors describing a tagged value whose payload does not match its tag.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("expected an object with `$$type` and `value`")]
    NotTagged,

    #[error("`{tag}` payload must be {expected}")]
    Shape { tag: String, expected: &'static str },

    #[error("'{0}' is not a six-digit hex color")]
    NotHexColor(String),

    #[error("size unit cannot be empty")]
    EmptyUnit,

    #[error("url cannot be empty")]
    EmptyUrl,

    #[error("number must be finite")]
    NonFinite,

    #[error("class name cannot be empty")]
    EmptyClassName,

    #[error("shadow color cannot be empty")]
    EmptyShadowColor,

    #[error("expected a `{expected}` value, found `{found}`")]
    WrongTag {
        expected: &'static str,
        found: String,
    },

    #[error("{field}: {source}")]
    Nested {
        field: &'static str,
        source: Box<ValueError>,
    },
}

impl ValueError {
    fn shape(tag: &str, expected: &'static str) -> Self {
        Self::Shape {
            tag: tag.to_string(),
            expected,
        }
    }

    fn nested(field: &'static str, source: ValueError) -> Self {
        Self::Nested {
            field,
            source: Box::new(source),
        }
    }
}

/// The type tags a mapping can target.
///
/// `Spacing` never appears on the wire: it names the legacy box control,
/// which the encoder turns into a `size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeTag {
    String,
    Number,
    Size,
    Spacing,
    Color,
    Url,
    Classes,
    Link,
    Image,
    Background,
    Shadow,
}

impl TypeTag {
    /// Returns the tag as written in mapping files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Size => "size",
            Self::Spacing => "spacing",
            Self::Color => "color",
            Self::Url => "url",
            Self::Classes => "classes",
            Self::Link => "link",
            Self::Image => "image",
            Self::Background => "background",
            Self::Shadow => "shadow",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dimension with its CSS unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Size {
    pub unit: String,
    pub size: f64,
}

/// A link target and its visible label.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub destination: String,
    pub label: String,
}

/// An image attachment reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Media library attachment id, when the image comes from the library.
    pub id: Option<u64>,
    pub url: String,
    /// Registered image size name (`thumbnail`, `medium`, `full`, ...).
    pub size: String,
}

/// Default image size name when the legacy value names none.
pub const DEFAULT_IMAGE_SIZE: &str = "medium";

/// A layered background.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Background {
    pub color: Option<String>,
    pub image: Option<Image>,
    pub overlay: Option<Vec<TypedValue>>,
}

/// A box shadow.
#[derive(Debug, Clone, PartialEq)]
pub struct Shadow {
    pub horizontal: f64,
    pub vertical: f64,
    pub blur: f64,
    pub spread: f64,
    pub color: String,
}

/// A V4 tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Number(f64),
    Size(Size),
    Color(String),
    Url(String),
    Classes(Vec<String>),
    Link(Link),
    Image(Image),
    Background(Background),
    Shadow(Shadow),
    /// A tag this crate does not model. Kept verbatim.
    Other { tag: String, value: Value },
}

fn hex_color_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").ok())
        .as_ref()
}

/// Returns true for `#rrggbb` colors.
#[must_use]
pub fn is_hex_color(value: &str) -> bool {
    hex_color_pattern().is_some_and(|re| re.is_match(value))
}

impl TypedValue {
    /// The wire tag of this value.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Size(_) => "size",
            Self::Color(_) => "color",
            Self::Url(_) => "url",
            Self::Classes(_) => "classes",
            Self::Link(_) => "link",
            Self::Image(_) => "image",
            Self::Background(_) => "background",
            Self::Shadow(_) => "shadow",
            Self::Other { tag, .. } => tag,
        }
    }

    /// Check that the payload satisfies the invariants of its tag.
    ///
    /// Unknown tags are accepted as-is.
    pub fn validate(&self) -> Result<(), ValueError> {
        match self {
            Self::String(_) | Self::Other { .. } => Ok(()),
            Self::Number(n) => check_finite(*n),
            Self::Size(size) => validate_size(size),
            Self::Color(color) => validate_color(color),
            Self::Url(url) => validate_url(url),
            Self::Classes(names) => {
                if names.iter().any(|n| n.trim().is_empty()) {
                    return Err(ValueError::EmptyClassName);
                }
                Ok(())
            }
            Self::Link(link) => {
                validate_url(&link.destination).map_err(|e| ValueError::nested("destination", e))
            }
            Self::Image(image) => validate_image(image),
            Self::Background(background) => {
                if let Some(color) = &background.color {
                    validate_color(color).map_err(|e| ValueError::nested("color", e))?;
                }
                if let Some(image) = &background.image {
                    validate_image(image).map_err(|e| ValueError::nested("image", e))?;
                }
                for layer in background.overlay.iter().flatten() {
                    layer
                        .validate()
                        .map_err(|e| ValueError::nested("background-overlay", e))?;
                }
                Ok(())
            }
            Self::Shadow(shadow) => {
                for n in [shadow.horizontal, shadow.vertical, shadow.blur, shadow.spread] {
                    check_finite(n)?;
                }
                if shadow.color.trim().is_empty() {
                    return Err(ValueError::EmptyShadowColor);
                }
                Ok(())
            }
        }
    }

    /// Render the value in its `{"$$type", "value"}` wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let payload = match self {
            Self::String(s) | Self::Color(s) | Self::Url(s) => Value::String(s.clone()),
            Self::Number(n) => json_number(*n),
            Self::Size(size) => size_payload(size),
            Self::Classes(names) => json!(names),
            Self::Link(link) => json!({
                "destination": tagged("url", json!(link.destination)),
                "label": tagged("string", json!(link.label)),
            }),
            Self::Image(image) => image_payload(image),
            Self::Background(background) => {
                let mut payload = Map::new();
                if let Some(color) = &background.color {
                    payload.insert("color".into(), tagged("color", json!(color)));
                }
                if let Some(image) = &background.image {
                    payload.insert("image".into(), tagged("image", image_payload(image)));
                }
                if let Some(overlay) = &background.overlay {
                    let layers: Vec<Value> = overlay.iter().map(TypedValue::to_json).collect();
                    payload.insert(
                        "background-overlay".into(),
                        tagged("background-overlay", Value::Array(layers)),
                    );
                }
                Value::Object(payload)
            }
            Self::Shadow(shadow) => json!({
                "horizontal": json_number(shadow.horizontal),
                "vertical": json_number(shadow.vertical),
                "blur": json_number(shadow.blur),
                "spread": json_number(shadow.spread),
                "color": shadow.color,
            }),
            Self::Other { value, .. } => value.clone(),
        };
        tagged(self.tag(), payload)
    }

    /// Read a value from its wire form.
    ///
    /// Only the shape of the payload is checked here; call
    /// [`TypedValue::validate`] for the tag invariants.
    pub fn from_json(json: &Value) -> Result<Self, ValueError> {
        let (tag, payload) = untag(json)?;
        match tag {
            "string" => Ok(Self::String(expect_str(tag, payload)?.to_string())),
            "number" => payload
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| ValueError::shape(tag, "a number")),
            "size" => parse_size(payload).map(Self::Size),
            "color" => Ok(Self::Color(expect_str(tag, payload)?.to_string())),
            "url" => Ok(Self::Url(expect_str(tag, payload)?.to_string())),
            "classes" => {
                let items = payload
                    .as_array()
                    .ok_or_else(|| ValueError::shape(tag, "an array of class names"))?;
                items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| ValueError::shape(tag, "an array of class names"))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Classes)
            }
            "link" => {
                let fields = expect_object(tag, payload, "an object with destination and label")?;
                let destination = match nested_field(fields, "destination")? {
                    Self::Url(url) => url,
                    _ => return Err(ValueError::nested("destination", ValueError::shape("url", "a url"))),
                };
                let label = match nested_field(fields, "label")? {
                    Self::String(label) => label,
                    _ => return Err(ValueError::nested("label", ValueError::shape("string", "a string"))),
                };
                Ok(Self::Link(Link { destination, label }))
            }
            "image" => parse_image(payload).map(Self::Image),
            "background" => {
                let fields = expect_object(tag, payload, "an object")?;
                let mut background = Background::default();
                if let Some(color) = fields.get("color") {
                    match Self::from_json(color).map_err(|e| ValueError::nested("color", e))? {
                        Self::Color(c) => background.color = Some(c),
                        _ => return Err(ValueError::nested("color", ValueError::shape("color", "a color"))),
                    }
                }
                if let Some(image) = fields.get("image") {
                    let image_payload = untag_as(image, "image", "image")?;
                    background.image =
                        Some(parse_image(image_payload).map_err(|e| ValueError::nested("image", e))?);
                }
                if let Some(overlay) = fields.get("background-overlay") {
                    let layers = untag_as(overlay, "background-overlay", "background-overlay")?;
                    let layers = layers
                        .as_array()
                        .ok_or_else(|| ValueError::shape("background-overlay", "an array"))?;
                    background.overlay = Some(
                        layers
                            .iter()
                            .map(Self::from_json)
                            .collect::<Result<Vec<_>, _>>()
                            .map_err(|e| ValueError::nested("background-overlay", e))?,
                    );
                }
                Ok(Self::Background(background))
            }
            "shadow" => {
                let fields = expect_object(tag, payload, "an object")?;
                let number = |key: &str| {
                    fields
                        .get(key)
                        .and_then(Value::as_f64)
                        .ok_or_else(|| ValueError::shape("shadow", "numeric offsets, blur and spread"))
                };
                Ok(Self::Shadow(Shadow {
                    horizontal: number("horizontal")?,
                    vertical: number("vertical")?,
                    blur: number("blur")?,
                    spread: number("spread")?,
                    color: fields
                        .get("color")
                        .and_then(Value::as_str)
                        .ok_or_else(|| ValueError::shape("shadow", "a color string"))?
                        .to_string(),
                }))
            }
            other => Ok(Self::Other {
                tag: other.to_string(),
                value: payload.clone(),
            }),
        }
    }
}

impl Serialize for TypedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TypedValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

fn tagged(tag: &str, payload: Value) -> Value {
    let mut object = Map::new();
    object.insert(TYPE_KEY.into(), Value::String(tag.to_string()));
    object.insert(VALUE_KEY.into(), payload);
    Value::Object(object)
}

fn untag(json: &Value) -> Result<(&str, &Value), ValueError> {
    let object = json.as_object().ok_or(ValueError::NotTagged)?;
    let tag = object
        .get(TYPE_KEY)
        .and_then(Value::as_str)
        .ok_or(ValueError::NotTagged)?;
    let payload = object.get(VALUE_KEY).ok_or(ValueError::NotTagged)?;
    Ok((tag, payload))
}

/// Untag a nested value that must carry the tag `expected`.
fn untag_as<'a>(
    json: &'a Value,
    expected: &'static str,
    field: &'static str,
) -> Result<&'a Value, ValueError> {
    let (tag, payload) = untag(json).map_err(|e| ValueError::nested(field, e))?;
    if tag != expected {
        return Err(ValueError::nested(
            field,
            ValueError::WrongTag {
                expected,
                found: tag.to_string(),
            },
        ));
    }
    Ok(payload)
}

/// Integral values render without a fractional part.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn json_number(n: f64) -> Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        Value::from(n as i64)
    } else {
        json!(n)
    }
}

fn expect_str<'a>(tag: &str, payload: &'a Value) -> Result<&'a str, ValueError> {
    payload.as_str().ok_or_else(|| ValueError::shape(tag, "a string"))
}

fn expect_object<'a>(
    tag: &str,
    payload: &'a Value,
    expected: &'static str,
) -> Result<&'a Map<String, Value>, ValueError> {
    payload.as_object().ok_or_else(|| ValueError::shape(tag, expected))
}

fn nested_field(fields: &Map<String, Value>, field: &'static str) -> Result<TypedValue, ValueError> {
    let json = fields.get(field).ok_or_else(|| ValueError::nested(field, ValueError::NotTagged))?;
    TypedValue::from_json(json).map_err(|e| ValueError::nested(field, e))
}

fn size_payload(size: &Size) -> Value {
    json!({ "unit": size.unit, "size": json_number(size.size) })
}

fn parse_size(payload: &Value) -> Result<Size, ValueError> {
    let unit = payload
        .get("unit")
        .and_then(Value::as_str)
        .ok_or_else(|| ValueError::shape("size", "an object with unit and size"))?;
    let size = payload
        .get("size")
        .and_then(Value::as_f64)
        .ok_or_else(|| ValueError::shape("size", "an object with unit and size"))?;
    Ok(Size {
        unit: unit.to_string(),
        size,
    })
}

fn image_payload(image: &Image) -> Value {
    let mut src = Map::new();
    if let Some(id) = image.id {
        src.insert("id".into(), tagged("image-attachment-id", json!(id)));
    }
    src.insert("url".into(), tagged("url", json!(image.url)));
    json!({
        "src": tagged("image-src", Value::Object(src)),
        "size": tagged("string", json!(image.size)),
    })
}

fn parse_image(payload: &Value) -> Result<Image, ValueError> {
    let fields = expect_object("image", payload, "an object with src")?;
    let src = fields
        .get("src")
        .ok_or_else(|| ValueError::shape("image", "an object with src"))?;
    let src = untag_as(src, "image-src", "src")?;
    let src = expect_object("image-src", src, "an object with url")?;

    let id = match src.get("id") {
        None | Some(Value::Null) => None,
        Some(id) => {
            match untag_as(id, "image-attachment-id", "id")? {
                Value::Null => None,
                other => Some(
                    other
                        .as_u64()
                        .ok_or_else(|| ValueError::shape("image-attachment-id", "an integer"))?,
                ),
            }
        }
    };
    let url = match nested_field(src, "url")? {
        TypedValue::Url(url) => url,
        _ => return Err(ValueError::nested("url", ValueError::shape("url", "a url"))),
    };
    let size = match fields.get("size") {
        None => DEFAULT_IMAGE_SIZE.to_string(),
        Some(_) => match nested_field(fields, "size")? {
            TypedValue::String(size) => size,
            _ => return Err(ValueError::nested("size", ValueError::shape("string", "a string"))),
        },
    };
    Ok(Image { id, url, size })
}

fn check_finite(n: f64) -> Result<(), ValueError> {
    if n.is_finite() {
        Ok(())
    } else {
        Err(ValueError::NonFinite)
    }
}

fn validate_size(size: &Size) -> Result<(), ValueError> {
    if size.unit.trim().is_empty() {
        return Err(ValueError::EmptyUnit);
    }
    check_finite(size.size)
}

fn validate_color(color: &str) -> Result<(), ValueError> {
    if is_hex_color(color) {
        Ok(())
    } else {
        Err(ValueError::NotHexColor(color.to_string()))
    }
}

fn validate_url(url: &str) -> Result<(), ValueError> {
    if url.trim().is_empty() {
        Err(ValueError::EmptyUrl)
    } else {
        Ok(())
    }
}

fn validate_image(image: &Image) -> Result<(), ValueError> {
    validate_url(&image.url).map_err(|e| ValueError::nested("src", e))
}
