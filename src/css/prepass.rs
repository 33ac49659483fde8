//! Text-level cleanup applied before stylesheet parsing

use super::options::SanitizationOptions;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::warn;

/// A quoted string, possibly left open at the end of input. Matched ahead
/// of the patterns below so their text inside strings is kept.
const STRING: &str = r#"(?P<string>"(?:[^"\\]|\\.|\\\z)*"?|'(?:[^'\\]|\\.|\\\z)*'?)"#;

/// Comments, including one left open at the end of input
static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?s){}|/\*.*?(?:\*/|\z)", STRING)).expect("comment pattern is valid")
});

/// `@import` in any syntactic form, up to its terminating `;`. Quoted and
/// `url()` targets are single units, so a `;` inside them does not end it.
static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?is){}|@import(?:url\s*\((?:"[^"]*"|'[^']*'|[^)"'])*\)|"[^"]*"|'[^']*'|[^;{{}}"'])*;?"#,
        STRING
    ))
    .expect("import pattern is valid")
});

/// Replace every match of `pattern` that is not a string with nothing
fn remove_outside_strings<'t>(pattern: &Regex, text: &'t str) -> Cow<'t, str> {
    pattern.replace_all(text, |caps: &Captures<'_>| match caps.name("string") {
        Some(string) => string.as_str().to_string(),
        None => String::new(),
    })
}

/// Strip control characters, comments and `@import` rules, then cap the
/// length at `max_css_length` bytes.
///
/// Control characters go first so they cannot split a keyword, and
/// comments go before imports so `@im/**/port` is reassembled and caught.
pub fn pre_sanitize(css: &str, options: &SanitizationOptions) -> String {
    let text = strip_control_characters(css);
    let text = remove_outside_strings(&COMMENT, &text);
    let mut text = remove_outside_strings(&IMPORT, &text).into_owned();

    let limit = options.max_css_length();
    if text.len() > limit {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        warn!(original_len = text.len(), limit, "CSS truncated due to size limit");
        text.truncate(end);
    }

    text
}

/// Remove C0 controls and DEL. Tab, newline, form feed and carriage
/// return separate tokens and become a space.
fn strip_control_characters(css: &str) -> Cow<'_, str> {
    if !css.chars().any(|c| c.is_ascii_control()) {
        return Cow::Borrowed(css);
    }
    Cow::Owned(
        css.chars()
            .filter_map(|c| match c {
                '\t' | '\n' | '\x0c' | '\r' => Some(' '),
                c if c.is_ascii_control() => None,
                c => Some(c),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(css: &str) -> String {
        pre_sanitize(css, &SanitizationOptions::default())
    }

    #[test]
    fn test_import_forms_removed() {
        assert_eq!(run("@import url('x.css'); p{color:red}"), " p{color:red}");
        assert_eq!(run("@IMPORT \"x.css\" screen;p{}"), "p{}");
        assert_eq!(run("@import x.css"), "");
    }

    #[test]
    fn test_import_target_with_semicolon_removed() {
        assert_eq!(run("@import url(\"x;y.css\"); p{color:red}"), " p{color:red}");
        assert_eq!(run("@import url('a;b.css') screen; p{color:red}"), " p{color:red}");
        assert_eq!(run("@import 'a;b.css'; p{color:red}"), " p{color:red}");
    }

    #[test]
    fn test_import_inside_string_kept() {
        assert_eq!(run("p{content:\"@import\"} q{color:red}"), "p{content:\"@import\"} q{color:red}");
        assert_eq!(run("p{content:'a\\'@import'}"), "p{content:'a\\'@import'}");
    }

    #[test]
    fn test_comment_inside_string_kept() {
        assert_eq!(run("p{content:\"/*\"}/* x */q{}"), "p{content:\"/*\"}q{}");
    }

    #[test]
    fn test_comment_split_import_removed() {
        assert_eq!(run("@im/**/port 'x';a{b:c}"), "a{b:c}");
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(run("a{/* x */color:red}/* open"), "a{color:red}");
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(run("a{\u{0}co\u{7f}lor:\tred}"), "a{color: red}");
    }

    #[test]
    fn test_truncation_on_char_boundary() {
        let options = SanitizationOptions::builder().max_css_length(5).build().unwrap();
        assert_eq!(pre_sanitize("abcdé", &options), "abcd");
        assert_eq!(pre_sanitize("abc", &options), "abc");
    }
}
