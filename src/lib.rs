//! RustySanitize - Streaming SVG/XML and CSS sanitization
//!
//! Strategies:
//! A: In-memory document (sanitize)
//! B: Reader to writer with bounded memory (sanitize_to)
//! C: Reader to lazily produced byte stream on a worker thread (sanitize_stream)
//! D: Parallel batches (strategy::parallel)
//!
//! Markup sanitization fails closed: malformed input is an error and no
//! output is returned. CSS sanitization never fails; anything it cannot
//! make safe becomes an empty string.

pub mod core;
pub mod css;
pub mod detect;
pub mod error;
pub mod filter;
pub mod patterns;
pub mod reader;
pub mod strategy;
pub mod stream;
pub mod writer;

#[cfg(feature = "nif")]
mod nif;

pub use css::{sanitize_css, sanitize_style_attribute, SanitizationOptions, SanitizationOptionsBuilder};
pub use error::{Result, SanitizeError};
pub use stream::SanitizedStream;

use filter::TokenFilter;
use reader::{SliceReader, StreamReader};
use std::io::{self, Read, Write};
use writer::XmlWriter;

// ============================================================================
// Allocator Configuration
// ============================================================================

// Only the NIF library owns its process allocator; a Rust binary linking
// the rlib keeps its own.
#[cfg(all(feature = "mimalloc", feature = "nif"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Sanitizer
// ============================================================================

/// SVG/XML sanitizer carrying the options used for embedded CSS
#[derive(Debug, Clone, Default)]
pub struct SvgSanitizer {
    css_options: SanitizationOptions,
}

impl SvgSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `options` for `style` elements and `style` attributes
    pub fn with_css_options(options: SanitizationOptions) -> Self {
        SvgSanitizer { css_options: options }
    }

    pub fn css_options(&self) -> &SanitizationOptions {
        &self.css_options
    }

    /// Sanitize a whole in-memory document
    pub fn sanitize_str(&self, input: &str) -> Result<String> {
        let mut source = SliceReader::new(input);
        let mut writer = XmlWriter::new(Vec::with_capacity(input.len()));
        TokenFilter::new(&self.css_options).run(&mut source, &mut writer)?;

        let bytes = writer.finish()?;
        String::from_utf8(bytes).map_err(|e| SanitizeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Sanitize from a reader into a writer, holding only the construct
    /// being parsed in memory. On error, whatever reached `output` must be
    /// discarded.
    pub fn sanitize_to<R: Read, W: Write>(&self, input: R, output: W) -> Result<()> {
        let mut source = StreamReader::new(input);
        let mut writer = XmlWriter::new(output);
        TokenFilter::new(&self.css_options).run(&mut source, &mut writer)?;
        writer.finish()?;
        Ok(())
    }

    /// Sanitize on a background thread, returning the output as a stream
    pub fn sanitize_stream<R>(&self, input: R) -> Result<SanitizedStream<R>>
    where
        R: Read + Send + 'static,
    {
        stream::sanitize_stream(input, self.css_options.clone())
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Sanitize a document with default options
pub fn sanitize(input: &str) -> Result<String> {
    SvgSanitizer::default().sanitize_str(input)
}

/// Sanitize from a reader into a writer with default options
pub fn sanitize_to<R: Read, W: Write>(input: R, output: W) -> Result<()> {
    SvgSanitizer::default().sanitize_to(input, output)
}

/// Sanitize on a background thread with default options
pub fn sanitize_stream<R>(input: R) -> Result<SanitizedStream<R>>
where
    R: Read + Send + 'static,
{
    SvgSanitizer::default().sanitize_stream(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{contains_entity_declaration, contains_external_resource, contains_script_capable_construct};

    const HOSTILE: &[&str] = &[
        "<svg><script>alert(1)</script><rect width=\"1\"/></svg>",
        "<svg xmlns=\"http://www.w3.org/2000/svg\" onload=\"alert(1)\"><circle r=\"1\"/></svg>",
        "<svg><a xlink:href=\"JaVa&#x09;ScRiPt:alert(1)\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">x</a></svg>",
        "<svg><foreignObject><body xmlns=\"http://www.w3.org/1999/xhtml\"><script>x</script></body></foreignObject></svg>",
        "<svg><image href=\"http://evil.com/t.png\"/><use href=\"//evil.com/s.svg#a\"/></svg>",
        "<svg><animate attributeName=\"href\" values=\"#a;javascript:alert(1)\"/></svg>",
        "<svg><rect fill=\"url(https://evil.com/p#x)\" style=\"background:url(javascript:x);fill:red\"/></svg>",
        "<svg><style>@import url(http://evil/x.css);rect{fill:\\65 xpression(alert(1))}</style></svg>",
        "<!DOCTYPE svg SYSTEM \"http://evil/x.dtd\"><svg>&ext;</svg>",
        "<?xml version=\"1.0\"?><?xml-stylesheet href=\"http://evil/x.css\"?><svg><EMBED src=\"x\"/><g/></svg>",
    ];

    #[test]
    fn test_script_element_removed() {
        assert_eq!(
            sanitize("<svg><script>alert(1)</script><rect width=\"1\"/></svg>").unwrap(),
            "<svg><rect width=\"1\"/></svg>"
        );
    }

    #[test]
    fn test_external_href_removed() {
        assert_eq!(sanitize("<svg><a href=\"http://evil.com/x\"/></svg>").unwrap(), "<svg><a/></svg>");
    }

    #[test]
    fn test_local_href_preserved() {
        assert_eq!(
            sanitize("<svg><a href=\"#local\"/></svg>").unwrap(),
            "<svg><a href=\"#local\"/></svg>"
        );
    }

    #[test]
    fn test_css_javascript_url() {
        assert_eq!(
            sanitize_css("body{background:url('javascript:alert(1)')}", &SanitizationOptions::default()),
            "body{background:none}"
        );
    }

    #[test]
    fn test_billion_laughs_shrinks() {
        let input = "<?xml version=\"1.0\"?>\
            <!DOCTYPE lolz [\
            <!ENTITY lol \"lol\">\
            <!ENTITY lol1 \"&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;&lol;\">\
            <!ENTITY lol2 \"&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;&lol1;\">\
            ]>\
            <svg><text>&lol2;&lol2;&lol2;</text></svg>";

        let output = sanitize(input).unwrap();
        assert_eq!(output, "<?xml version=\"1.0\"?><svg><text/></svg>");
        assert!(!contains_entity_declaration(&output));
        assert!(output.len() < input.len());
    }

    #[test]
    fn test_malformed_input_fails_without_output() {
        assert!(matches!(sanitize("<svg><g></svg>"), Err(SanitizeError::Parse(_))));
        assert!(sanitize("<svg").is_err());
        assert!(sanitize("").is_err());
    }

    #[test]
    fn test_invariants_hold_on_hostile_inputs() {
        for input in HOSTILE {
            let output = sanitize(input).unwrap();
            assert!(!contains_script_capable_construct(&output).unwrap(), "{} -> {}", input, output);
            assert!(!contains_external_resource(&output).unwrap(), "{} -> {}", input, output);
            assert!(!contains_entity_declaration(&output), "{} -> {}", input, output);
        }
    }

    #[test]
    fn test_idempotent() {
        let benign = [
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><defs><linearGradient id=\"g\"/></defs>\
             <rect fill=\"url(#g)\" style=\"stroke: blue; stroke-width : 2px\"/>\
             <text>a &amp; b &lt; c</text><!-- note --><![CDATA[x < y]]></svg>",
            "<svg><style>a > b { color: red } @media print { p { fill: blue } }</style></svg>",
            "<svg><style>p{content:\"x</style></svg>",
            "<svg><style>p{width:1px\\</style></svg>",
            "<svg><style>@import url(\"x;y.css\"); p{color:red}</style></svg>",
            "<svg><rect style=\"content:'x\"/></svg>",
        ];
        for input in HOSTILE.iter().chain(benign.iter()) {
            let once = sanitize(input).unwrap();
            let twice = sanitize(&once).unwrap();
            assert_eq!(once, twice, "{}", input);
        }
    }

    #[test]
    fn test_open_string_in_style_element_closed() {
        assert_eq!(
            sanitize("<svg><style>p{content:\"x</style></svg>").unwrap(),
            "<svg><style>p{content:\"x\"}</style></svg>"
        );
    }

    #[test]
    fn test_sanitize_to_matches_in_memory() {
        for input in HOSTILE {
            let mut out = Vec::new();
            sanitize_to(input.as_bytes(), &mut out).unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), sanitize(input).unwrap());
        }
    }

    #[test]
    fn test_sanitize_stream_matches_in_memory() {
        let input = HOSTILE[7].to_string();
        let mut stream = sanitize_stream(io::Cursor::new(input.clone().into_bytes())).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, sanitize(&input).unwrap());
    }

    #[test]
    fn test_css_options_reach_style_elements() {
        let options = SanitizationOptions::builder()
            .strict_property_whitelist(true)
            .build()
            .unwrap();
        let sanitizer = SvgSanitizer::with_css_options(options);
        assert_eq!(
            sanitizer
                .sanitize_str("<svg><style>p{color:red;cursor:pointer}</style><g style=\"cursor:x\"/></svg>")
                .unwrap(),
            "<svg><style>p{color:red}</style><g/></svg>"
        );
    }
}
