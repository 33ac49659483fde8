//! Token to Event Decoding
//!
//! Turns tokenizer output into `XmlEvent`s while enforcing the
//! well-formedness rules the tokenizer cannot see on its own: tag
//! nesting, a single root element, and where declarations may appear.
//! Shared by the slice and stream readers.

use super::events::{EndElement, StartElement, XmlEvent};
use crate::core::attributes::parse_attributes;
use crate::core::entities::{is_char_reference, resolve_reference};
use crate::core::scanner::is_whitespace;
use crate::core::tokenizer::{ParseError, Token, TokenKind};
use std::borrow::Cow;
use std::collections::VecDeque;

/// Document-level parse state
#[derive(Debug, Default)]
pub struct EventDecoder {
    /// Names of currently open elements
    stack: Vec<String>,
    /// A token has been seen
    started: bool,
    /// The root element has been closed
    root_closed: bool,
    seen_doctype: bool,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one token into zero, one, or two events.
    ///
    /// `base` is the document offset of the tokenizer's input window.
    pub fn decode<'a>(
        &mut self,
        token: Token<'a>,
        base: usize,
        out: &mut VecDeque<XmlEvent<'a>>,
    ) -> Result<(), ParseError> {
        let at = base + token.span.0;
        let first = !self.started;
        self.started = true;

        match token.kind {
            TokenKind::XmlDeclaration => {
                if !first {
                    return Err(ParseError::new(
                        "XML declaration allowed only at the start of the document",
                        at,
                    ));
                }
                let content = token.content.unwrap_or("");
                // '<?xml' precedes the declaration's pseudo-attributes
                out.push_back(decode_declaration(content, at + 5)?);
            }

            TokenKind::DocType => {
                if self.seen_doctype || !self.stack.is_empty() || self.root_closed {
                    return Err(ParseError::new("DOCTYPE must precede the root element", at));
                }
                self.seen_doctype = true;
                out.push_back(XmlEvent::DocType(Cow::Borrowed(token.content.unwrap_or(""))));
            }

            TokenKind::StartTag | TokenKind::EmptyTag => {
                if self.root_closed {
                    return Err(ParseError::new("Multiple root elements", at));
                }
                let name = token.name.unwrap_or("");
                let raw_attrs = token.content.unwrap_or("");
                let attributes = parse_attributes(raw_attrs, at + 1 + name.len())?;
                out.push_back(XmlEvent::StartElement(StartElement::new(name, attributes)));

                if token.kind == TokenKind::EmptyTag {
                    out.push_back(XmlEvent::EndElement(EndElement::new(name)));
                    if self.stack.is_empty() {
                        self.root_closed = true;
                    }
                } else {
                    self.stack.push(name.to_string());
                }
            }

            TokenKind::EndTag => {
                let name = token.name.unwrap_or("");
                match self.stack.pop() {
                    Some(open) if open == name => {}
                    Some(open) => {
                        return Err(ParseError::new(
                            format!("Mismatched end tag: expected </{}>, found </{}>", open, name),
                            at,
                        ))
                    }
                    None => {
                        return Err(ParseError::new(format!("Unexpected end tag </{}>", name), at))
                    }
                }
                if self.stack.is_empty() {
                    self.root_closed = true;
                }
                out.push_back(XmlEvent::EndElement(EndElement::new(name)));
            }

            TokenKind::Text => {
                let content = token.content.unwrap_or("");
                if self.stack.is_empty() {
                    // Whitespace around the root is not document content
                    if content.bytes().all(is_whitespace) {
                        return Ok(());
                    }
                    return Err(ParseError::new("Text content outside root element", at));
                }
                if content.contains("]]>") {
                    return Err(ParseError::new("']]>' not allowed in text content", at));
                }
                out.push_back(XmlEvent::Characters(Cow::Borrowed(content)));
            }

            TokenKind::EntityRef => {
                let name = token.name.unwrap_or("");
                if self.stack.is_empty() {
                    return Err(ParseError::new("Reference outside root element", at));
                }
                match resolve_reference(name) {
                    Some(c) => out.push_back(XmlEvent::Characters(Cow::Owned(c.to_string()))),
                    None if is_char_reference(name) => {
                        return Err(ParseError::new(
                            format!("Invalid character reference &{};", name),
                            at,
                        ))
                    }
                    None => out.push_back(XmlEvent::EntityReference(Cow::Borrowed(name))),
                }
            }

            TokenKind::CData => {
                if self.stack.is_empty() {
                    return Err(ParseError::new("CDATA section outside root element", at));
                }
                out.push_back(XmlEvent::CData(Cow::Borrowed(token.content.unwrap_or(""))));
            }

            TokenKind::Comment => {
                out.push_back(XmlEvent::Comment(Cow::Borrowed(token.content.unwrap_or(""))));
            }

            TokenKind::ProcessingInstruction => {
                let data = token.content.filter(|d| !d.is_empty()).map(Cow::Borrowed);
                out.push_back(XmlEvent::ProcessingInstruction {
                    target: Cow::Borrowed(token.name.unwrap_or("")),
                    data,
                });
            }
        }

        Ok(())
    }

    /// Check end-of-document state. `end` is the document length.
    pub fn finish(&self, end: usize) -> Result<(), ParseError> {
        if let Some(open) = self.stack.last() {
            return Err(ParseError::new(format!("Unclosed element <{}>", open), end));
        }
        if !self.root_closed {
            return Err(ParseError::new("Document has no root element", end));
        }
        Ok(())
    }
}

/// Decode `version`, `encoding` and `standalone` from an XML declaration
fn decode_declaration(content: &str, base: usize) -> Result<XmlEvent<'_>, ParseError> {
    let attrs = parse_attributes(content, base)?;

    let mut version = None;
    let mut encoding = None;
    let mut standalone = None;
    for attr in attrs {
        match attr.name.as_ref() {
            "version" => version = Some(attr.value),
            "encoding" => {
                let label = attr.value.as_ref();
                if !label.eq_ignore_ascii_case("utf-8") && !label.eq_ignore_ascii_case("us-ascii") {
                    return Err(ParseError::new(
                        format!("Unsupported encoding '{}': only UTF-8 input is accepted", label),
                        base,
                    ));
                }
                encoding = Some(attr.value);
            }
            "standalone" => {
                standalone = match attr.value.as_ref() {
                    "yes" => Some(true),
                    "no" => Some(false),
                    _ => return Err(ParseError::new("standalone must be 'yes' or 'no'", base)),
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("Unexpected '{}' in XML declaration", other),
                    base,
                ))
            }
        }
    }

    let version = version.ok_or_else(|| ParseError::new("XML declaration requires a version", base))?;
    Ok(XmlEvent::XmlDeclaration { version, encoding, standalone })
}
