//! CSS Sanitizer
//!
//! Cleans stylesheet text found in `style` elements and attributes:
//! - Pre-pass: control characters, comments and `@import` stripped, length capped
//! - Parser: tokens to rule tree (iterative, nesting bounded)
//! - Sanitizer: dangerous rules removed, dangerous declarations neutralized
//! - Writer: canonical minimized text
//!
//! Every failure yields an empty string. Losing styling is always safer
//! than letting a payload through.

pub mod ast;
pub mod escape;
pub mod options;
pub mod parser;
pub mod prepass;
pub mod sanitize;
pub mod tokenizer;
pub mod writer;

pub use escape::decode_css_escapes;
pub use options::{SanitizationOptions, SanitizationOptionsBuilder};

use crate::error::Result;
use tracing::warn;

/// Sanitize stylesheet text. Never fails; errors produce `""`.
pub fn sanitize_css(css: &str, options: &SanitizationOptions) -> String {
    if css.trim().is_empty() {
        return String::new();
    }

    match try_sanitize_css(css, options) {
        Ok(clean) => clean,
        Err(e) => {
            warn!(error = %e, "CSS sanitization failed, returning empty stylesheet");
            String::new()
        }
    }
}

fn try_sanitize_css(css: &str, options: &SanitizationOptions) -> Result<String> {
    let text = prepass::pre_sanitize(css, options);
    let mut sheet = parser::parse_stylesheet(&text, options.max_nesting_depth())?;
    sanitize::sanitize_stylesheet(&mut sheet, options);
    Ok(writer::write_stylesheet(&sheet))
}

/// Sanitize the declaration list of a `style` attribute. Never fails;
/// errors produce `""`.
pub fn sanitize_style_attribute(css: &str, options: &SanitizationOptions) -> String {
    if css.trim().is_empty() {
        return String::new();
    }

    match try_sanitize_style_attribute(css, options) {
        Ok(clean) => clean,
        Err(e) => {
            warn!(error = %e, "style attribute sanitization failed, dropping value");
            String::new()
        }
    }
}

fn try_sanitize_style_attribute(css: &str, options: &SanitizationOptions) -> Result<String> {
    let text = prepass::pre_sanitize(css, options);
    let mut declarations = parser::parse_declaration_list(&text)?;
    sanitize::sanitize_declarations(&mut declarations, options);
    Ok(writer::write_declarations(&declarations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(css: &str) -> String {
        sanitize_css(css, &SanitizationOptions::default())
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean(""), "");
        assert_eq!(clean("  \n\t "), "");
    }

    #[test]
    fn test_safe_css_preserved() {
        assert_eq!(clean("rect { fill: #ff0000; stroke-width: 2px }"), "rect{fill:#ff0000;stroke-width:2px}");
    }

    #[test]
    fn test_import_forms_removed_siblings_survive() {
        let inputs = [
            "@import url('http://evil/x.css'); p { color: red }",
            "@IMPORT 'x.css'; p { color: red }",
            "@im/**/port 'x.css'; p { color: red }",
            "@\\69 mport 'x.css'; p { color: red }",
            "@\\000069mport url(x); p { color: red }",
            "@import url(\"x;y.css\"); p { color: red }",
            "@import 'a;b.css'; p { color: red }",
        ];
        for input in inputs {
            let out = clean(input);
            assert!(!out.to_lowercase().contains("@import"), "{} -> {}", input, out);
            assert_eq!(out, "p{color:red}", "{}", input);
        }
    }

    #[test]
    fn test_import_text_in_string_does_not_cut_rules() {
        assert_eq!(clean("p{content:\"@import\"} q{color:red}"), "p{content:normal}q{color:red}");
        assert_eq!(clean("p{content:\"/* x */\"} q{color:red}"), "p{content:\"/* x */\"}q{color:red}");
    }

    #[test]
    fn test_open_string_and_lone_backslash_closed() {
        assert_eq!(clean("p{content:\"x"), "p{content:\"x\"}");
        assert_eq!(clean("p{content:'it\\'s'}"), "p{content:\"it's\"}");
        assert_eq!(clean("p{width:1px\\"), "p{width:1px}");
    }

    #[test]
    fn test_hex_escaped_keyword_removed() {
        let out = clean("p { width: \\65\\78\\70\\72\\65\\73\\73\\69\\6f\\6e(alert(1)) }");
        assert!(!out.to_lowercase().contains("expression"));
        assert_eq!(out, "p{width:initial}");
    }

    #[test]
    fn test_nesting_limit_fails_closed() {
        let options = SanitizationOptions::builder().max_nesting_depth(2).build().unwrap();
        let css = "@media a{@media b{@media c{p{color:red}}}}";
        assert_eq!(sanitize_css(css, &options), "");
        assert_eq!(sanitize_css("@media a{@media b{p{color:red}}}", &options), "@media a{@media b{p{color:red}}}");
    }

    #[test]
    fn test_truncated_css_still_parses() {
        let options = SanitizationOptions::builder().max_css_length(12).build().unwrap();
        assert_eq!(sanitize_css("p{color:red}q{color:blue}", &options), "p{color:red}");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "@media screen { a > b { color: red; background: url(javascript:x) } } p{margin:0 auto}",
            "p{content:\"x",
            "p{content:'x",
            "p{width:1px\\",
            "p{content:\"a\\\"b\\\\\"}",
            "p{font-family:\"A B\", serif}",
            "a[title=\"x",
            "a\\",
        ];
        for css in inputs {
            let once = clean(css);
            assert_eq!(clean(&once), once, "{}", css);
        }
    }

    #[test]
    fn test_style_attribute() {
        let options = SanitizationOptions::default();
        assert_eq!(
            sanitize_style_attribute("fill: red; background: url(http://x/y.png)", &options),
            "fill:red;background:none"
        );
        assert_eq!(sanitize_style_attribute("   ", &options), "");
    }
}
