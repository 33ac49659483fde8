//! SIMD-accelerated XML scanning using memchr
//!
//! Uses memchr crate for fast byte searching with SIMD acceleration:
//! - SSE2 (default x86_64)
//! - AVX2 (runtime detection)
//! - NEON (aarch64)
//!
//! The scanner walks a `&str` but searches its bytes. Every position it
//! stops at is an ASCII delimiter (or the end of input), so slicing the
//! input at those positions always lands on a char boundary.

use memchr::{memchr, memchr2, memmem};

/// Scanner for XML delimiter detection
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Scanner { input, pos: 0 }
    }

    /// Get the current position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Set the current position
    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Total input length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.input.len()
    }

    /// Check if we've reached the end
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    /// Get remaining input
    #[inline]
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Get a slice from start to end positions
    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    /// Peek at current byte without advancing
    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    /// Peek at byte at offset from current position
    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    /// Advance by n bytes
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) {
        let bytes = self.bytes();
        while self.pos < bytes.len() && is_whitespace(bytes[self.pos]) {
            self.pos += 1;
        }
    }

    /// Find tag end while handling quotes properly.
    /// Returns the position of '>' that is not inside quotes.
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let bytes = self.bytes();
        let mut pos = self.pos;
        let mut quote: Option<u8> = None;

        while pos < bytes.len() {
            let b = bytes[pos];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => return Some(pos),
                None => {}
            }
            pos += 1;
        }
        None
    }

    /// Find next '<' or '&' (text content boundaries)
    #[inline]
    pub fn find_text_boundary(&self) -> Option<usize> {
        memchr2(b'<', b'&', &self.bytes()[self.pos..]).map(|i| self.pos + i)
    }

    /// Find next occurrence of a specific byte
    #[inline]
    pub fn find_byte(&self, byte: u8) -> Option<usize> {
        memchr(byte, &self.bytes()[self.pos..]).map(|i| self.pos + i)
    }

    /// Find next occurrence of a delimiter sequence such as `-->` or `]]>`
    #[inline]
    pub fn find_str(&self, needle: &str) -> Option<usize> {
        memmem::find(&self.bytes()[self.pos..], needle.as_bytes()).map(|i| self.pos + i)
    }

    /// Check if input starts with a sequence at current position
    #[inline]
    pub fn starts_with(&self, needle: &str) -> bool {
        self.bytes()[self.pos..].starts_with(needle.as_bytes())
    }

    /// Read an XML name (starts with letter/underscore/colon, continues with
    /// letters/digits/hyphens/underscores/periods/colons)
    pub fn read_name(&mut self) -> Option<&'a str> {
        let bytes = self.bytes();
        let start = self.pos;

        if start >= bytes.len() || !is_name_start_char(bytes[start]) {
            return None;
        }

        self.pos += 1;
        while self.pos < bytes.len() && is_name_char(bytes[self.pos]) {
            self.pos += 1;
        }

        Some(&self.input[start..self.pos])
    }
}

/// Check if byte is XML whitespace
#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Check if byte is valid XML name start character
/// Allows ASCII letters, underscore, colon, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Check if byte is valid XML name character
/// Allows ASCII alphanumeric, punctuation, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_text_boundary() {
        let scanner = Scanner::new("hello &amp; <world>");
        assert_eq!(scanner.find_text_boundary(), Some(6));
    }

    #[test]
    fn test_find_tag_end_quoted() {
        let scanner = Scanner::new("<a attr=\">test\">content");
        assert_eq!(scanner.find_tag_end_quoted(), Some(15));
    }

    #[test]
    fn test_find_tag_end_mixed_quotes() {
        let scanner = Scanner::new("<a t='\">' u=\"'>\">");
        assert_eq!(scanner.find_tag_end_quoted(), Some(16));
    }

    #[test]
    fn test_find_str() {
        let scanner = Scanner::new("<!-- a - b -->tail");
        assert_eq!(scanner.find_str("-->"), Some(11));
    }

    #[test]
    fn test_read_name() {
        let mut scanner = Scanner::new("element-name>");
        assert_eq!(scanner.read_name(), Some("element-name"));
        assert_eq!(scanner.position(), 12);
    }

    #[test]
    fn test_read_unicode_name() {
        let mut scanner = Scanner::new("élément attr");
        assert_eq!(scanner.read_name(), Some("élément"));
    }

    #[test]
    fn test_skip_whitespace() {
        let mut scanner = Scanner::new("  \t\n hello");
        scanner.skip_whitespace();
        assert_eq!(scanner.position(), 5);
    }
}
