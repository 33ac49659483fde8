//! Canonical XML Writer
//!
//! Serializes `XmlEvent`s back to markup. Output is deterministic: attribute
//! values are always double-quoted, namespace declarations precede
//! attributes, and an element with no content is written as `<name/>`.

use crate::core::entities::{encode_attribute, encode_text};
use crate::reader::events::{StartElement, XmlEvent};
use std::io::{self, BufWriter, Write};

/// Event-to-markup serializer over any byte sink
pub struct XmlWriter<W: Write> {
    out: BufWriter<W>,
    /// A start tag has been written without its closing '>'
    open_tag: bool,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(sink: W) -> Self {
        XmlWriter {
            out: BufWriter::new(sink),
            open_tag: false,
        }
    }

    /// Write one event
    pub fn write_event(&mut self, event: &XmlEvent<'_>) -> io::Result<()> {
        if let XmlEvent::EndElement(end) = event {
            if self.open_tag {
                self.open_tag = false;
                return self.out.write_all(b"/>");
            }
            return write!(self.out, "</{}>", end.name);
        }

        // Empty text leaves a pending start tag collapsible
        if let XmlEvent::Characters(text) = event {
            if text.is_empty() {
                return Ok(());
            }
        }

        self.close_open_tag()?;

        match event {
            XmlEvent::XmlDeclaration { version, encoding, standalone } => {
                write!(self.out, "<?xml version=\"{}\"", encode_attribute(version))?;
                if let Some(encoding) = encoding {
                    write!(self.out, " encoding=\"{}\"", encode_attribute(encoding))?;
                }
                if let Some(standalone) = standalone {
                    let value = if *standalone { "yes" } else { "no" };
                    write!(self.out, " standalone=\"{}\"", value)?;
                }
                self.out.write_all(b"?>")
            }
            XmlEvent::StartElement(start) => self.write_start(start),
            XmlEvent::Characters(text) => self.out.write_all(encode_text(text).as_bytes()),
            XmlEvent::CData(text) => write!(self.out, "<![CDATA[{}]]>", text),
            XmlEvent::Comment(text) => write!(self.out, "<!--{}-->", text),
            XmlEvent::ProcessingInstruction { target, data } => match data {
                Some(data) => write!(self.out, "<?{} {}?>", target, data),
                None => write!(self.out, "<?{}?>", target),
            },
            XmlEvent::DocType(text) => write!(self.out, "<!{}>", text),
            XmlEvent::EntityReference(name) => write!(self.out, "&{};", name),
            XmlEvent::EndElement(_) => Ok(()),
        }
    }

    fn write_start(&mut self, start: &StartElement<'_>) -> io::Result<()> {
        write!(self.out, "<{}", start.name)?;
        for ns in &start.namespaces {
            write!(self.out, " {}=\"{}\"", ns.attribute_name(), encode_attribute(&ns.uri))?;
        }
        for attr in &start.attributes {
            write!(self.out, " {}=\"{}\"", attr.name, encode_attribute(&attr.value))?;
        }
        self.open_tag = true;
        Ok(())
    }

    fn close_open_tag(&mut self) -> io::Result<()> {
        if self.open_tag {
            self.open_tag = false;
            self.out.write_all(b">")?;
        }
        Ok(())
    }

    /// Flush and return the sink
    pub fn finish(mut self) -> io::Result<W> {
        self.close_open_tag()?;
        self.out.into_inner().map_err(|e| e.into_error())
    }
}
