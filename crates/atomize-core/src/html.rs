//! Reduce legacy rich-text editor HTML to plain text.

use regex::Regex;
use std::sync::OnceLock;

fn script_or_style() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").ok())
        .as_ref()
}

fn any_tag() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<[^>]*>").ok()).as_ref()
}

/// Strip markup from an HTML fragment, decode entities, and trim.
///
/// Script and style elements are removed together with their contents.
#[must_use]
pub fn strip_markup(html: &str) -> String {
    let mut text = html.to_string();
    for pattern in [script_or_style(), any_tag()].into_iter().flatten() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    decode_entities(&text).trim().to_string()
}

/// Decode named and numeric HTML character references.
///
/// Unknown references are left untouched.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        match candidate
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_reference(&candidate[1..end]).map(|c| (c, end)))
        {
            Some((decoded, end)) => {
                out.push(decoded);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Null, surrogates, out-of-range and non-whitespace control code points
/// become U+FFFD.
fn numeric_char(code: u32) -> char {
    match char::from_u32(code) {
        Some(c) if c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\u{c}') => {
            char::REPLACEMENT_CHARACTER
        }
        Some(c) => c,
        None => char::REPLACEMENT_CHARACTER,
    }
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return Some(numeric_char(code));
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        _ => return None,
    };
    Some(c)
}
