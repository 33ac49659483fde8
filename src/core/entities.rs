//! XML Entity Handling
//!
//! Handles the references a sanitizer may resolve without a DTD:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Any other named reference is never expanded. Uses Cow for zero-copy
//! when no references are present.

use memchr::memchr;
use std::borrow::Cow;

/// Resolve a reference name (without `&` and `;`) to its character.
///
/// Returns `None` for user-defined entities, which have no meaning
/// without the DTD the sanitizer refuses to load.
pub fn resolve_reference(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        return decode_numeric_reference(numeric);
    }

    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Check whether a reference is a character reference (`#...`)
#[inline]
pub fn is_char_reference(name: &str) -> bool {
    name.starts_with('#')
}

/// Decode a numeric character reference body (after `#`)
fn decode_numeric_reference(body: &str) -> Option<char> {
    let codepoint = if let Some(hex) = body.strip_prefix('x') {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()?
    } else {
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        body.parse::<u32>().ok()?
    };

    if !is_valid_xml_char(codepoint) {
        return None;
    }
    char::from_u32(codepoint)
}

/// Decode an attribute value, resolving built-in and numeric references.
///
/// Fails on a bare `&`, an unterminated reference, or a reference to a
/// user-defined entity. `Err` carries the offset of the offending `&`
/// within `raw`.
pub fn decode_attribute_value(raw: &str) -> Result<Cow<'_, str>, (&'static str, usize)> {
    // Fast path: check if there are any references using SIMD
    if memchr(b'&', raw.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(raw));
    }

    let mut result = String::with_capacity(raw.len());
    let mut pos = 0;

    while let Some(offset) = memchr(b'&', &raw.as_bytes()[pos..]) {
        let amp = pos + offset;
        result.push_str(&raw[pos..amp]);

        let semi = match memchr(b';', &raw.as_bytes()[amp..]) {
            Some(s) => amp + s,
            None => return Err(("Unterminated reference in attribute value", amp)),
        };
        let name = &raw[amp + 1..semi];
        if name.is_empty() {
            return Err(("Bare '&' not allowed in attribute value", amp));
        }

        match resolve_reference(name) {
            Some(c) => result.push(c),
            None if is_char_reference(name) => {
                return Err(("Invalid character reference in attribute value", amp));
            }
            None => return Err(("Reference to undeclared entity in attribute value", amp)),
        }
        pos = semi + 1;
    }
    result.push_str(&raw[pos..]);

    Ok(Cow::Owned(result))
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}

/// Encode text for XML output (escape markup characters)
pub fn encode_text(input: &str) -> Cow<'_, str> {
    // Fast path: check if any escaping needed
    if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&')) {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Encode text for use in a double-quoted XML attribute.
///
/// Whitespace other than space is written as character references so it
/// survives attribute-value normalization on the next parse.
pub fn encode_attribute(input: &str) -> Cow<'_, str> {
    if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&' | b'"' | b'\t' | b'\n' | b'\r')) {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\t' => result.push_str("&#9;"),
            '\n' => result.push_str("&#10;"),
            '\r' => result.push_str("&#13;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}
