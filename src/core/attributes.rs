//! XML Attribute Parsing
//!
//! Parses XML attributes from tag content. Parsing is strict: anything a
//! conforming parser would reject is reported, never guessed around.

use super::entities::decode_attribute_value;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use super::tokenizer::ParseError;
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Attribute name (may include namespace prefix)
    pub name: Cow<'a, str>,
    /// Attribute value (references decoded)
    pub value: Cow<'a, str>,
}

impl<'a> Attribute<'a> {
    /// Create a new attribute
    pub fn new(name: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Local name (after colon, if namespaced)
    pub fn local_name(&self) -> &str {
        split_name(&self.name).1
    }

    /// Namespace prefix (before colon), if any
    pub fn prefix(&self) -> Option<&str> {
        split_name(&self.name).0
    }

    /// Detach from the input buffer
    pub fn into_owned(self) -> Attribute<'static> {
        Attribute {
            name: Cow::Owned(self.name.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
        }
    }
}

/// Split a name into prefix and local name at the colon
pub fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.find(':') {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

/// Parse attributes from raw tag content (after the element name).
///
/// Input should be the content between element name and '>' or '/>'.
/// `base` is the byte offset of `input` in the document, used for errors.
pub fn parse_attributes(input: &str, base: usize) -> Result<Vec<Attribute<'_>>, ParseError> {
    let bytes = input.as_bytes();
    let mut attrs: Vec<Attribute<'_>> = Vec::new();
    let mut pos = 0;

    loop {
        let ws_start = pos;
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        if pos == ws_start {
            return Err(ParseError::new("Whitespace required between attributes", base + pos));
        }

        // Attribute name
        let name_start = pos;
        if !is_name_start_char(bytes[pos]) {
            return Err(ParseError::new(
                "Attribute name must start with letter, underscore, or colon",
                base + pos,
            ));
        }
        while pos < bytes.len() && is_name_char(bytes[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        // '=' with optional surrounding whitespace
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'=' {
            return Err(ParseError::new("Attribute value required", base + pos));
        }
        pos += 1;
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }

        // Quoted value
        let quote = match bytes.get(pos) {
            Some(&q) if q == b'"' || q == b'\'' => q,
            _ => return Err(ParseError::new("Attribute value must be quoted", base + pos)),
        };
        pos += 1;
        let value_start = pos;
        while pos < bytes.len() && bytes[pos] != quote {
            if bytes[pos] == b'<' {
                return Err(ParseError::new("Attribute value cannot contain '<'", base + pos));
            }
            pos += 1;
        }
        if pos >= bytes.len() {
            return Err(ParseError::new("Attribute value has mismatched quotes", base + value_start));
        }

        let raw_value = &input[value_start..pos];
        let value = decode_attribute_value(raw_value)
            .map_err(|(msg, offset)| ParseError::new(msg, base + value_start + offset))?;
        pos += 1; // Skip closing quote

        if attrs.iter().any(|a| a.name == name) {
            return Err(ParseError::new(
                format!("Duplicate attribute '{}'", name),
                base + name_start,
            ));
        }
        attrs.push(Attribute::new(name, value));
    }

    Ok(attrs)
}
