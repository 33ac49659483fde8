//! CSS escape decoding

use std::borrow::Cow;

/// Decode CSS escape sequences.
///
/// Handles hex escapes of 1-6 digits (one following whitespace character
/// is consumed), escaped newlines (removed), and single-character escapes.
/// Code points that cannot be represented decode to U+FFFD.
pub fn decode_css_escapes(input: &str) -> Cow<'_, str> {
    if !input.contains('\\') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            None => out.push('\\'),
            Some('\n') | Some('\x0c') => {
                chars.next();
            }
            Some('\r') => {
                chars.next();
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some(h) if h.is_ascii_hexdigit() => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 6 {
                    match chars.peek().and_then(|d| d.to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            digits += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                let decoded = match char::from_u32(value) {
                    Some('\0') | None => '\u{FFFD}',
                    Some(ch) => ch,
                };
                out.push(decoded);

                if let Some(&ws) = chars.peek() {
                    if ws == '\r' {
                        chars.next();
                        if chars.peek() == Some(&'\n') {
                            chars.next();
                        }
                    } else if matches!(ws, ' ' | '\t' | '\n' | '\x0c') {
                        chars.next();
                    }
                }
            }
            Some(other) => {
                chars.next();
                out.push(other);
            }
        }
    }

    Cow::Owned(out)
}

/// Append `text` as a closed double-quoted CSS string
pub fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            '\r' => out.push_str("\\d "),
            '\x0c' => out.push_str("\\c "),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_escapes_borrowed() {
        assert!(matches!(decode_css_escapes("color"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_hex_escapes() {
        assert_eq!(decode_css_escapes("\\65 xpression"), "expression");
        assert_eq!(decode_css_escapes("\\000065xpression"), "expression");
        assert_eq!(
            decode_css_escapes("\\6a\\61\\76\\61\\73\\63\\72\\69\\70\\74:"),
            "javascript:"
        );
    }

    #[test]
    fn test_single_char_escape() {
        assert_eq!(decode_css_escapes("ex\\pression"), "expression");
        assert_eq!(decode_css_escapes("a\\;b"), "a;b");
    }

    #[test]
    fn test_escaped_newline_removed() {
        assert_eq!(decode_css_escapes("java\\\nscript"), "javascript");
    }

    #[test]
    fn test_invalid_code_points() {
        assert_eq!(decode_css_escapes("\\110000"), "\u{FFFD}");
        assert_eq!(decode_css_escapes("\\0"), "\u{FFFD}");
        assert_eq!(decode_css_escapes("\\d800"), "\u{FFFD}");
    }

    #[test]
    fn test_push_quoted_escapes() {
        let mut out = String::new();
        push_quoted(&mut out, "a\"b\\c\nd");
        assert_eq!(out, "\"a\\\"b\\\\c\\a d\"");
        assert_eq!(decode_css_escapes(&out[1..out.len() - 1]), "a\"b\\c\nd");
    }

    #[test]
    fn test_trailing_backslash_kept() {
        assert_eq!(decode_css_escapes("abc\\"), "abc\\");
    }
}
