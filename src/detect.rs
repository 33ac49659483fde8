//! Detection Predicates
//!
//! Read-only checks answering whether a document still holds a given kind
//! of construct. They verify sanitizer output and are never used by the
//! sanitizer itself. Malformed documents are reported as parse errors.

use crate::error::Result;
use crate::patterns::{classify_attribute, AttributeVerdict};
use crate::reader::{EventSource, SliceReader, XmlEvent};
use regex::Regex;
use std::sync::LazyLock;

/// Script vectors inside stylesheet text
static STYLE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(<script.*?>|</script>|expression\(|behavior:|javascript:|iframe|textarea)")
        .expect("style script pattern is valid")
});

/// Run `found` on every event until it reports a hit
fn any_event<F>(doc: &str, mut found: F) -> Result<bool>
where
    F: FnMut(&XmlEvent<'_>) -> bool,
{
    let mut reader = SliceReader::new(doc);
    while let Some(event) = reader.next_event()? {
        if found(&event) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Script elements (in any namespace, including inside `foreignObject`),
/// event handler attributes, or attribute values with a script scheme
pub fn contains_script_capable_construct(doc: &str) -> Result<bool> {
    any_event(doc, |event| match event {
        XmlEvent::StartElement(start) => {
            start.local_name().eq_ignore_ascii_case("script")
                || start.attributes.iter().any(|attr| {
                    matches!(
                        classify_attribute(attr.local_name(), &attr.value),
                        AttributeVerdict::EventHandler | AttributeVerdict::ScriptScheme
                    )
                })
        }
        _ => false,
    })
}

/// Script-like payloads in `style` element text or `style` attributes
pub fn contains_script_in_style(doc: &str) -> Result<bool> {
    let mut style_depth = 0usize;
    let mut text = String::new();

    any_event(doc, |event| match event {
        XmlEvent::StartElement(start) => {
            if style_depth > 0 || start.local_name().eq_ignore_ascii_case("style") {
                style_depth += 1;
            }
            start
                .attributes
                .iter()
                .any(|attr| attr.local_name().eq_ignore_ascii_case("style") && STYLE_SCRIPT.is_match(&attr.value))
        }
        XmlEvent::Characters(chunk) | XmlEvent::CData(chunk) if style_depth > 0 => {
            text.push_str(chunk);
            false
        }
        XmlEvent::EndElement(_) if style_depth > 0 => {
            style_depth -= 1;
            if style_depth == 0 {
                let hit = STYLE_SCRIPT.is_match(&text);
                text.clear();
                return hit;
            }
            false
        }
        _ => false,
    })
}

/// An external DOCTYPE subset, a reference attribute pointing outside the
/// document, or a presentation attribute with an external `url()`
pub fn contains_external_resource(doc: &str) -> Result<bool> {
    any_event(doc, |event| match event {
        XmlEvent::DocType(text) => has_external_id(text),
        XmlEvent::StartElement(start) => start.attributes.iter().any(|attr| {
            matches!(
                classify_attribute(attr.local_name(), &attr.value),
                AttributeVerdict::ExternalReference | AttributeVerdict::ExternalUrl
            )
        }),
        _ => false,
    })
}

/// Whether the document declares a DOCTYPE or entities at all
pub fn contains_entity_declaration(doc: &str) -> bool {
    doc.contains("<!DOCTYPE") || doc.contains("<!ENTITY")
}

/// Check a DOCTYPE body (`DOCTYPE name ...`) for a SYSTEM or PUBLIC
/// identifier before any internal subset
fn has_external_id(doctype: &str) -> bool {
    let head = doctype.split('[').next().unwrap_or(doctype);
    head.split_ascii_whitespace()
        .nth(2)
        .is_some_and(|keyword| keyword == "SYSTEM" || keyword == "PUBLIC")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_element_detected() {
        assert!(contains_script_capable_construct("<svg><script>x</script></svg>").unwrap());
        assert!(contains_script_capable_construct("<svg><h:SCRIPT xmlns:h=\"x\"/></svg>").unwrap());
        assert!(!contains_script_capable_construct("<svg><rect/></svg>").unwrap());
    }

    #[test]
    fn test_handlers_and_schemes_detected() {
        assert!(contains_script_capable_construct("<svg onload=\"x()\"/>").unwrap());
        assert!(contains_script_capable_construct("<svg><a href=\" javascript:x\"/></svg>").unwrap());
        assert!(contains_script_capable_construct(
            "<svg><foreignObject><div onclick=\"x\"/></foreignObject></svg>"
        )
        .unwrap());
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(contains_script_capable_construct("<svg>").is_err());
        assert!(contains_external_resource("<svg><g></svg>").is_err());
    }

    #[test]
    fn test_script_in_style() {
        assert!(contains_script_in_style("<svg><style>a{width:expression(1)}</style></svg>").unwrap());
        assert!(contains_script_in_style("<svg><style><![CDATA[<script>]]></style></svg>").unwrap());
        assert!(contains_script_in_style("<svg><style>a{b:c}&lt;/script&gt;</style></svg>").unwrap());
        assert!(contains_script_in_style("<svg><rect style=\"behavior: url(x)\"/></svg>").unwrap());
        assert!(!contains_script_in_style("<svg><style>a{fill:red}</style><text>iframe</text></svg>").unwrap());
    }

    #[test]
    fn test_external_resources() {
        assert!(contains_external_resource("<svg><image href=\"http://x/a.png\"/></svg>").unwrap());
        assert!(contains_external_resource("<svg><use xlink:href=\"other.svg#a\" xmlns:xlink=\"l\"/></svg>").unwrap());
        assert!(contains_external_resource("<svg><rect fill=\"url(http://x/p)\"/></svg>").unwrap());
        assert!(!contains_external_resource("<svg><use href=\"#a\"/><image href=\"data:image/png,x\"/></svg>").unwrap());
    }

    #[test]
    fn test_external_doctype() {
        let doc = "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/svg11.dtd\"><svg/>";
        assert!(contains_external_resource(doc).unwrap());
        let internal = "<!DOCTYPE svg [<!ENTITY x \"SYSTEM\">]><svg/>";
        assert!(!contains_external_resource(internal).unwrap());
    }

    #[test]
    fn test_entity_declaration() {
        assert!(contains_entity_declaration("<!DOCTYPE svg [<!ENTITY a \"b\">]><svg/>"));
        assert!(!contains_entity_declaration("<svg/>"));
    }
}
