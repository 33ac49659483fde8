//! XML Event Types
//!
//! Event types for pull-parser style XML processing. Every event borrows
//! from the input where it can and can be detached with `into_owned`.

use crate::core::attributes::{split_name, Attribute};
use std::borrow::Cow;

/// XML parsing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent<'a> {
    /// XML declaration: <?xml version="1.0"?>
    XmlDeclaration {
        version: Cow<'a, str>,
        encoding: Option<Cow<'a, str>>,
        standalone: Option<bool>,
    },
    /// Start of an element. Empty elements produce a start and an end.
    StartElement(StartElement<'a>),
    /// End of an element: </name>
    EndElement(EndElement<'a>),
    /// Character data with references resolved
    Characters(Cow<'a, str>),
    /// CDATA section content
    CData(Cow<'a, str>),
    /// Comment content
    Comment(Cow<'a, str>),
    /// Processing instruction: <?target data?>
    ProcessingInstruction {
        target: Cow<'a, str>,
        data: Option<Cow<'a, str>>,
    },
    /// DOCTYPE declaration text, never interpreted
    DocType(Cow<'a, str>),
    /// Reference to an entity with no built-in meaning, never expanded
    EntityReference(Cow<'a, str>),
}

impl<'a> XmlEvent<'a> {
    /// Detach from the input buffer
    pub fn into_owned(self) -> XmlEvent<'static> {
        match self {
            XmlEvent::XmlDeclaration { version, encoding, standalone } => XmlEvent::XmlDeclaration {
                version: owned(version),
                encoding: encoding.map(owned),
                standalone,
            },
            XmlEvent::StartElement(start) => XmlEvent::StartElement(start.into_owned()),
            XmlEvent::EndElement(end) => XmlEvent::EndElement(end.into_owned()),
            XmlEvent::Characters(text) => XmlEvent::Characters(owned(text)),
            XmlEvent::CData(text) => XmlEvent::CData(owned(text)),
            XmlEvent::Comment(text) => XmlEvent::Comment(owned(text)),
            XmlEvent::ProcessingInstruction { target, data } => XmlEvent::ProcessingInstruction {
                target: owned(target),
                data: data.map(owned),
            },
            XmlEvent::DocType(text) => XmlEvent::DocType(owned(text)),
            XmlEvent::EntityReference(name) => XmlEvent::EntityReference(owned(name)),
        }
    }
}

#[inline]
fn owned(s: Cow<'_, str>) -> Cow<'static, str> {
    Cow::Owned(s.into_owned())
}

/// A namespace declaration carried on a start element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace<'a> {
    /// Declared prefix, or None for the default namespace
    pub prefix: Option<Cow<'a, str>>,
    pub uri: Cow<'a, str>,
}

impl<'a> Namespace<'a> {
    /// Attribute name this declaration is written as
    pub fn attribute_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        }
    }

    pub fn into_owned(self) -> Namespace<'static> {
        Namespace {
            prefix: self.prefix.map(owned),
            uri: owned(self.uri),
        }
    }
}

/// Start element event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement<'a> {
    /// Full element name (may include prefix)
    pub name: Cow<'a, str>,
    /// Element attributes, excluding namespace declarations
    pub attributes: Vec<Attribute<'a>>,
    /// Namespace declarations in document order
    pub namespaces: Vec<Namespace<'a>>,
}

impl<'a> StartElement<'a> {
    /// Create a start element, moving `xmlns` attributes into `namespaces`
    pub fn new(name: impl Into<Cow<'a, str>>, attributes: Vec<Attribute<'a>>) -> Self {
        let mut plain = Vec::with_capacity(attributes.len());
        let mut namespaces = Vec::new();

        for attr in attributes {
            match split_name(&attr.name) {
                (None, "xmlns") => namespaces.push(Namespace { prefix: None, uri: attr.value }),
                (Some("xmlns"), local) => {
                    let prefix = Cow::Owned(local.to_string());
                    namespaces.push(Namespace { prefix: Some(prefix), uri: attr.value });
                }
                _ => plain.push(attr),
            }
        }

        StartElement {
            name: name.into(),
            attributes: plain,
            namespaces,
        }
    }

    /// Local name (after colon)
    pub fn local_name(&self) -> &str {
        split_name(&self.name).1
    }

    pub fn into_owned(self) -> StartElement<'static> {
        StartElement {
            name: owned(self.name),
            attributes: self.attributes.into_iter().map(Attribute::into_owned).collect(),
            namespaces: self.namespaces.into_iter().map(Namespace::into_owned).collect(),
        }
    }
}

/// End element event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndElement<'a> {
    /// Full element name
    pub name: Cow<'a, str>,
}

impl<'a> EndElement<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>) -> Self {
        EndElement { name: name.into() }
    }

    /// Local name (after colon)
    pub fn local_name(&self) -> &str {
        split_name(&self.name).1
    }

    pub fn into_owned(self) -> EndElement<'static> {
        EndElement { name: owned(self.name) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_split_from_attributes() {
        let start = StartElement::new(
            "svg",
            vec![
                Attribute::new("xmlns", "http://www.w3.org/2000/svg"),
                Attribute::new("xmlns:xlink", "http://www.w3.org/1999/xlink"),
                Attribute::new("width", "10"),
            ],
        );
        assert_eq!(start.attributes.len(), 1);
        assert_eq!(start.namespaces.len(), 2);
        assert_eq!(start.namespaces[0].attribute_name(), "xmlns");
        assert_eq!(start.namespaces[1].attribute_name(), "xmlns:xlink");
    }

    #[test]
    fn test_local_name() {
        let start = StartElement::new("svg:script", Vec::new());
        assert_eq!(start.local_name(), "script");
        assert_eq!(EndElement::new("svg:script").local_name(), "script");
    }

    #[test]
    fn test_plain_attributes_kept_in_order() {
        let start = StartElement::new("rect", vec![Attribute::new("fill", "red"), Attribute::new("x", "1")]);
        let names: Vec<&str> = start.attributes.iter().map(|a| &*a.name).collect();
        assert_eq!(names, ["fill", "x"]);
        assert_eq!(start.attributes[0].value, "red");
    }
}
