//! Markup Token Filter
//!
//! Single forward pass from an `EventSource` into an `XmlWriter`:
//! - DOCTYPE, entity references and `xml-stylesheet` PIs are dropped
//! - Unsafe elements are dropped with their whole subtree (depth counter,
//!   nothing buffered)
//! - `style` element text is collected and replaced by sanitized CSS
//! - Unsafe attributes are removed, `style` attributes sanitized
//!
//! Everything else passes through in document order.

use crate::css::{sanitize_css, sanitize_style_attribute, SanitizationOptions};
use crate::error::Result;
use crate::patterns::{classify_attribute, is_style_element, is_unsafe_element, AttributeVerdict};
use crate::reader::{EndElement, EventSource, StartElement, XmlEvent};
use crate::writer::XmlWriter;
use lru::LruCache;
use std::borrow::Cow;
use std::io::Write;
use std::num::NonZeroUsize;
use tracing::debug;

/// Distinct `style` attribute values remembered per document
const STYLE_CACHE_CAPACITY: usize = 128;

/// Streaming sanitizer state for one document
pub struct TokenFilter<'o> {
    options: &'o SanitizationOptions,
    /// Raw `style` attribute value -> sanitized value
    style_cache: LruCache<String, String>,
}

impl<'o> TokenFilter<'o> {
    pub fn new(options: &'o SanitizationOptions) -> Self {
        let capacity = NonZeroUsize::new(STYLE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        TokenFilter {
            options,
            style_cache: LruCache::new(capacity),
        }
    }

    /// Pump every event from `source` through the filter into `writer`.
    ///
    /// A parse error aborts immediately. Output already handed to the writer
    /// must then be discarded by the caller.
    pub fn run<'a, S, W>(&mut self, source: &mut S, writer: &mut XmlWriter<W>) -> Result<()>
    where
        S: EventSource<'a>,
        W: Write,
    {
        while let Some(event) = source.next_event()? {
            match event {
                XmlEvent::DocType(_) => {
                    debug!("dropping DOCTYPE declaration");
                }
                XmlEvent::EntityReference(name) => {
                    debug!(entity = %name, "dropping entity reference");
                }
                XmlEvent::ProcessingInstruction { ref target, .. }
                    if target.eq_ignore_ascii_case("xml-stylesheet") =>
                {
                    debug!("dropping xml-stylesheet processing instruction");
                }
                XmlEvent::StartElement(start) => {
                    if is_unsafe_element(start.local_name()) {
                        debug!(element = %start.name, "skipping unsafe element subtree");
                        skip_subtree(source)?;
                    } else if is_style_element(start.local_name()) {
                        let start = self.filter_attributes(start);
                        let css = collect_style_text(source, self.options.max_css_length())?;
                        let clean = sanitize_css(&css, self.options);
                        let end = EndElement::new(start.name.clone());

                        writer.write_event(&XmlEvent::StartElement(start))?;
                        writer.write_event(&XmlEvent::Characters(Cow::Owned(clean)))?;
                        writer.write_event(&XmlEvent::EndElement(end))?;
                    } else {
                        let start = self.filter_attributes(start);
                        writer.write_event(&XmlEvent::StartElement(start))?;
                    }
                }
                other => writer.write_event(&other)?,
            }
        }
        Ok(())
    }

    /// Remove unsafe attributes and sanitize `style`, keeping order and
    /// namespace bindings
    fn filter_attributes<'a>(&mut self, mut start: StartElement<'a>) -> StartElement<'a> {
        let element = start.name.clone();

        start.attributes.retain_mut(|attr| match classify_attribute(attr.local_name(), &attr.value) {
            AttributeVerdict::Keep => true,
            AttributeVerdict::Style => {
                let clean = self.sanitize_style_value(&attr.value);
                if clean.is_empty() {
                    debug!(element = %element, "dropping style attribute with nothing safe left");
                    return false;
                }
                attr.value = Cow::Owned(clean);
                true
            }
            verdict => {
                debug!(element = %element, attribute = %attr.name, ?verdict, "dropping attribute");
                false
            }
        });

        start
    }

    fn sanitize_style_value(&mut self, value: &str) -> String {
        if let Some(clean) = self.style_cache.get(value) {
            return clean.clone();
        }
        let clean = sanitize_style_attribute(value, self.options);
        self.style_cache.put(value.to_string(), clean.clone());
        clean
    }
}

/// Consume events up to and including the end tag matching an already
/// consumed start tag
fn skip_subtree<'a, S: EventSource<'a>>(source: &mut S) -> Result<()> {
    let mut depth = 1usize;

    while let Some(event) = source.next_event()? {
        match event {
            XmlEvent::StartElement(_) => depth += 1,
            XmlEvent::EndElement(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Concatenate the text of a `style` element up to its end tag, keeping at
/// most `limit` bytes. Nested elements are dropped but their text counts.
fn collect_style_text<'a, S: EventSource<'a>>(source: &mut S, limit: usize) -> Result<String> {
    let mut css = String::new();
    let mut depth = 1usize;

    while let Some(event) = source.next_event()? {
        match event {
            XmlEvent::Characters(text) | XmlEvent::CData(text) => push_capped(&mut css, &text, limit),
            XmlEvent::StartElement(_) => depth += 1,
            XmlEvent::EndElement(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    Ok(css)
}

fn push_capped(css: &mut String, text: &str, limit: usize) {
    let room = limit.saturating_sub(css.len());
    if text.len() <= room {
        css.push_str(text);
        return;
    }
    let mut end = room;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    css.push_str(&text[..end]);
}
