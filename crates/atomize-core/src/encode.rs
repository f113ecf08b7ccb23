//! Shape raw legacy setting values into V4 tagged values.

use crate::value::{
    Background, Image, Link, Shadow, Size, TypeTag, TypedValue, ValueError, DEFAULT_IMAGE_SIZE,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised when a raw value cannot take the shape of its target tag.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("`{tag}` expects {expected}, found {found}")]
    UnexpectedShape {
        tag: TypeTag,
        expected: &'static str,
        found: &'static str,
    },

    #[error("size is missing its {0}")]
    MissingSizeField(&'static str),

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("spacing sides differ ({0}); only uniform spacing has a size encoding")]
    NonUniformSpacing(String),

    #[error(transparent)]
    Invalid(#[from] ValueError),
}

/// Human-readable name of a JSON value's kind.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn unexpected(tag: TypeTag, expected: &'static str, found: &Value) -> EncodingError {
    EncodingError::UnexpectedShape {
        tag,
        expected,
        found: json_kind(found),
    }
}

/// Encode a raw legacy value as a tagged value of type `tag`.
///
/// The result always satisfies [`TypedValue::validate`].
pub fn encode(raw: &Value, tag: TypeTag) -> Result<TypedValue, EncodingError> {
    let value = match tag {
        TypeTag::String => TypedValue::String(encode_string(raw)?),
        TypeTag::Number => TypedValue::Number(number(raw)?.ok_or_else(|| unexpected(tag, "a number", raw))?),
        TypeTag::Size => TypedValue::Size(encode_size(raw)?),
        TypeTag::Spacing => TypedValue::Size(encode_spacing(raw)?),
        TypeTag::Color => match raw {
            Value::String(s) => TypedValue::Color(s.trim().to_string()),
            other => return Err(unexpected(tag, "a hex color string", other)),
        },
        TypeTag::Url => TypedValue::Url(encode_url(raw)?),
        TypeTag::Classes => TypedValue::Classes(encode_classes(raw)?),
        TypeTag::Link => TypedValue::Link(encode_link(raw)?),
        TypeTag::Image => TypedValue::Image(encode_image(raw)?),
        TypeTag::Background => TypedValue::Background(encode_background(raw)?),
        TypeTag::Shadow => TypedValue::Shadow(encode_shadow(raw)?),
    };
    value.validate()?;
    Ok(value)
}

/// Prefix `http://` onto scheme-less `www.` urls. Everything else passes verbatim.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("www.") {
        format!("http://{url}")
    } else {
        url.to_string()
    }
}

fn encode_string(raw: &Value) -> Result<String, EncodingError> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(unexpected(TypeTag::String, "a string", other)),
    }
}

/// Read a number that legacy controls may have stored as a string.
///
/// `Ok(None)` means the value is blank.
fn number(raw: &Value) -> Result<Option<f64>, EncodingError> {
    match raw {
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| EncodingError::NotANumber(s.clone())),
        Value::Null => Ok(None),
        other => Err(unexpected(TypeTag::Number, "a number", other)),
    }
}

fn unit_of(fields: &Map<String, Value>) -> Result<String, EncodingError> {
    match fields.get("unit").and_then(Value::as_str).map(str::trim) {
        Some(unit) if !unit.is_empty() => Ok(unit.to_string()),
        _ => Err(EncodingError::MissingSizeField("unit")),
    }
}

fn encode_size(raw: &Value) -> Result<Size, EncodingError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| unexpected(TypeTag::Size, "an object with unit and size", raw))?;
    let unit = unit_of(fields)?;
    let size = fields
        .get("size")
        .map(number)
        .transpose()?
        .flatten()
        .ok_or(EncodingError::MissingSizeField("size"))?;
    Ok(Size { unit, size })
}

fn encode_spacing(raw: &Value) -> Result<Size, EncodingError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| unexpected(TypeTag::Spacing, "a box or size object", raw))?;
    if fields.contains_key("size") {
        return encode_size(raw);
    }

    let unit = unit_of(fields)?;
    let mut sides = Vec::with_capacity(4);
    for side in ["top", "right", "bottom", "left"] {
        sides.push(fields.get(side).map(number).transpose()?.flatten());
    }

    let linked = match fields.get("isLinked") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true" || s == "1",
        _ => false,
    };
    let first = sides[0].ok_or(EncodingError::MissingSizeField("size"))?;
    let uniform = sides.iter().all(|side| *side == Some(first));
    if linked || uniform {
        return Ok(Size { unit, size: first });
    }

    let described = sides
        .iter()
        .map(|side| side.map_or_else(|| "-".to_string(), |n| n.to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    Err(EncodingError::NonUniformSpacing(described))
}

fn encode_url(raw: &Value) -> Result<String, EncodingError> {
    match raw {
        Value::String(s) => Ok(normalize_url(s)),
        Value::Object(fields) => match fields.get("url") {
            Some(Value::String(s)) => Ok(normalize_url(s)),
            _ => Err(unexpected(TypeTag::Url, "an object with a url", raw)),
        },
        other => Err(unexpected(TypeTag::Url, "a url string", other)),
    }
}

fn encode_classes(raw: &Value) -> Result<Vec<String>, EncodingError> {
    match raw {
        Value::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| unexpected(TypeTag::Classes, "class name strings", item))
            })
            .collect(),
        other => Err(unexpected(TypeTag::Classes, "class names", other)),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn encode_link(raw: &Value) -> Result<Link, EncodingError> {
    match raw {
        Value::String(url) => Ok(Link {
            destination: normalize_url(url),
            label: String::new(),
        }),
        Value::Object(fields) => Ok(Link {
            destination: normalize_url(&string_field(fields, "url")),
            label: string_field(fields, "label"),
        }),
        other => Err(unexpected(TypeTag::Link, "a link object", other)),
    }
}

fn encode_image(raw: &Value) -> Result<Image, EncodingError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| unexpected(TypeTag::Image, "an image object", raw))?;
    let id = match fields.get("id") {
        Some(Value::Number(n)) => n.as_u64().filter(|id| *id > 0),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok().filter(|id| *id > 0),
        _ => None,
    };
    let size = match fields.get("size").and_then(Value::as_str) {
        Some(size) if !size.trim().is_empty() => size.to_string(),
        _ => DEFAULT_IMAGE_SIZE.to_string(),
    };
    Ok(Image {
        id,
        url: string_field(fields, "url"),
        size,
    })
}

fn encode_background(raw: &Value) -> Result<Background, EncodingError> {
    match raw {
        Value::String(color) => Ok(Background {
            color: Some(color.trim().to_string()),
            ..Background::default()
        }),
        Value::Object(fields) => {
            let color = match fields.get("color") {
                None | Some(Value::Null) => None,
                Some(Value::String(c)) => Some(c.trim().to_string()),
                Some(other) => return Err(unexpected(TypeTag::Background, "a color string", other)),
            };
            let image = match fields.get("image") {
                None | Some(Value::Null) => None,
                Some(image) => Some(encode_image(image)?),
            };
            if color.is_none() && image.is_none() {
                return Err(unexpected(TypeTag::Background, "a color or image", raw));
            }
            Ok(Background {
                color,
                image,
                overlay: None,
            })
        }
        other => Err(unexpected(TypeTag::Background, "a color or background object", other)),
    }
}

fn encode_shadow(raw: &Value) -> Result<Shadow, EncodingError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| unexpected(TypeTag::Shadow, "a shadow object", raw))?;
    let offset = |key: &'static str| -> Result<f64, EncodingError> {
        fields
            .get(key)
            .map(number)
            .transpose()?
            .flatten()
            .ok_or_else(|| unexpected(TypeTag::Shadow, "numeric offsets, blur and spread", raw))
    };
    Ok(Shadow {
        horizontal: offset("horizontal")?,
        vertical: offset("vertical")?,
        blur: offset("blur")?,
        spread: offset("spread")?,
        color: string_field(fields, "color"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_pass_through() {
        assert_eq!(
            encode(&json!("center"), TypeTag::String).unwrap(),
            TypedValue::String("center".into())
        );
        assert_eq!(
            encode(&json!(600), TypeTag::String).unwrap(),
            TypedValue::String("600".into())
        );
    }

    #[test]
    fn size_needs_unit_and_size() {
        assert_eq!(
            encode(&json!({ "unit": "px", "size": 24, "sizes": [] }), TypeTag::Size).unwrap(),
            TypedValue::Size(Size { unit: "px".into(), size: 24.0 })
        );
        assert_eq!(
            encode(&json!({ "unit": "em", "size": "1.5" }), TypeTag::Size).unwrap(),
            TypedValue::Size(Size { unit: "em".into(), size: 1.5 })
        );
        assert_eq!(
            encode(&json!({ "size": 24 }), TypeTag::Size),
            Err(EncodingError::MissingSizeField("unit"))
        );
        assert_eq!(
            encode(&json!({ "unit": "px", "size": "" }), TypeTag::Size),
            Err(EncodingError::MissingSizeField("size"))
        );
    }

    #[test]
    fn colors_must_be_hex() {
        assert_eq!(
            encode(&json!("#1A2b3C"), TypeTag::Color).unwrap(),
            TypedValue::Color("#1A2b3C".into())
        );
        assert_eq!(
            encode(&json!("red"), TypeTag::Color),
            Err(EncodingError::Invalid(ValueError::NotHexColor("red".into())))
        );
    }

    #[test]
    fn www_urls_gain_a_scheme() {
        assert_eq!(normalize_url("www.example.com"), "http://www.example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url("/contact"), "/contact");
        assert_eq!(normalize_url("mailto:a@b.test"), "mailto:a@b.test");
    }

    #[test]
    fn legacy_link_object() {
        let link = encode(
            &json!({ "url": "www.example.com", "is_external": "", "nofollow": "" }),
            TypeTag::Link,
        )
        .unwrap();
        assert_eq!(
            link,
            TypedValue::Link(Link {
                destination: "http://www.example.com".into(),
                label: String::new(),
            })
        );
        assert!(matches!(
            encode(&json!({ "url": "" }), TypeTag::Link),
            Err(EncodingError::Invalid(ValueError::Nested { field: "destination", .. }))
        ));
    }

    #[test]
    fn legacy_image_object() {
        let image = encode(
            &json!({ "id": "17", "url": "https://cdn.test/p.jpg", "alt": "" }),
            TypeTag::Image,
        )
        .unwrap();
        assert_eq!(
            image,
            TypedValue::Image(Image {
                id: Some(17),
                url: "https://cdn.test/p.jpg".into(),
                size: DEFAULT_IMAGE_SIZE.into(),
            })
        );
    }

    #[test]
    fn linked_spacing_becomes_size() {
        let raw = json!({ "unit": "px", "top": "10", "right": "10", "bottom": "10", "left": "10", "isLinked": true });
        assert_eq!(
            encode(&raw, TypeTag::Spacing).unwrap(),
            TypedValue::Size(Size { unit: "px".into(), size: 10.0 })
        );

        let raw = json!({ "unit": "px", "top": "10", "right": "0", "bottom": "10", "left": "0", "isLinked": false });
        assert!(matches!(
            encode(&raw, TypeTag::Spacing),
            Err(EncodingError::NonUniformSpacing(_))
        ));
    }

    #[test]
    fn background_from_color_string() {
        assert_eq!(
            encode(&json!("#007cba"), TypeTag::Background).unwrap(),
            TypedValue::Background(Background {
                color: Some("#007cba".into()),
                ..Background::default()
            })
        );
        assert!(encode(&json!("blue"), TypeTag::Background).is_err());
    }

    #[test]
    fn shadow_requires_all_offsets() {
        let raw = json!({ "horizontal": 0, "vertical": 2, "blur": 10, "spread": 0, "color": "rgba(0,0,0,0.5)" });
        assert!(matches!(encode(&raw, TypeTag::Shadow).unwrap(), TypedValue::Shadow(_)));

        let raw = json!({ "horizontal": 0, "blur": 10, "spread": 0, "color": "#000000" });
        assert!(matches!(
            encode(&raw, TypeTag::Shadow),
            Err(EncodingError::UnexpectedShape { tag: TypeTag::Shadow, .. })
        ));
    }

    #[test]
    fn re_encoding_a_valid_value_stays_valid() {
        let cases = [
            (json!("plain"), TypeTag::String),
            (json!({ "unit": "rem", "size": 2 }), TypeTag::Size),
            (json!("#abcdef"), TypeTag::Color),
            (json!("www.a.test"), TypeTag::Url),
        ];
        for (raw, tag) in cases {
            let first = encode(&raw, tag).unwrap();
            let raw_again = match &first {
                TypedValue::Size(size) => json!({ "unit": size.unit, "size": size.size }),
                other => other.to_json()["value"].clone(),
            };
            let second = encode(&raw_again, tag).unwrap();
            assert!(second.validate().is_ok());
            assert_eq!(first, second);
        }
    }
}
