//! CSS Tokenizer
//!
//! A subset of CSS Syntax Level 3 tokenization. Each token keeps the raw
//! source text it was read from (used for output) and, where one exists, a
//! decoded value with escapes resolved (used for classification).

/// Kind of CSS token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssTokenKind {
    Ident,
    /// Function name followed by '(' (both in `raw`)
    Function,
    AtKeyword,
    Hash,
    String,
    /// String interrupted by an unescaped newline
    BadString,
    /// Unquoted `url(...)`
    Url,
    BadUrl,
    Number,
    Percentage,
    Dimension,
    Whitespace,
    Colon,
    Semicolon,
    Comma,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Delim(char),
    /// `<!--`
    Cdo,
    /// `-->`
    Cdc,
}

/// A CSS token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssToken<'a> {
    pub kind: CssTokenKind,
    /// Source text of the token
    pub raw: &'a str,
    /// Decoded name, string contents or URL; empty for other kinds
    pub value: String,
}

#[inline]
fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

#[inline]
fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}

#[inline]
fn is_newline(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\x0c')
}

#[inline]
fn is_css_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

fn is_valid_escape(first: Option<char>, second: Option<char>) -> bool {
    first == Some('\\') && second.is_some_and(|c| !is_newline(c))
}

fn starts_ident(first: Option<char>, second: Option<char>, third: Option<char>) -> bool {
    match first {
        Some('-') => {
            second.is_some_and(|c| is_name_start(c) || c == '-') || is_valid_escape(second, third)
        }
        Some('\\') => is_valid_escape(first, second),
        Some(c) => is_name_start(c),
        None => false,
    }
}

fn starts_number(first: Option<char>, second: Option<char>, third: Option<char>) -> bool {
    let digit = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit());
    match first {
        Some('+') | Some('-') => digit(second) || (second == Some('.') && digit(third)),
        Some('.') => digit(second),
        c => digit(c),
    }
}

/// Streaming CSS tokenizer over a string slice
pub struct CssTokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> CssTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        CssTokenizer { input, pos: 0 }
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    #[inline]
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    #[inline]
    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn token(&self, kind: CssTokenKind, start: usize, value: String) -> CssToken<'a> {
        CssToken {
            kind,
            raw: &self.input[start..self.pos],
            value,
        }
    }

    /// Skip any comments at the current position
    fn skip_comments(&mut self) {
        while self.input[self.pos..].starts_with("/*") {
            match self.input[self.pos + 2..].find("*/") {
                Some(end) => self.pos += 2 + end + 2,
                None => self.pos = self.input.len(),
            }
        }
    }

    /// Consume an escape after the backslash
    fn consume_escape(&mut self) -> char {
        match self.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 6 {
                    match self.peek().and_then(|d| d.to_digit(16)) {
                        Some(d) => {
                            value = value * 16 + d;
                            digits += 1;
                            self.bump();
                        }
                        None => break,
                    }
                }
                if self.peek() == Some('\r') {
                    self.bump();
                    if self.peek() == Some('\n') {
                        self.bump();
                    }
                } else if self.peek().is_some_and(is_css_whitespace) {
                    self.bump();
                }
                match char::from_u32(value) {
                    Some('\0') | None => '\u{FFFD}',
                    Some(ch) => ch,
                }
            }
            Some(_) => self.bump().unwrap_or('\u{FFFD}'),
            None => '\u{FFFD}',
        }
    }

    /// Consume a name, decoding escapes
    fn consume_name(&mut self) -> String {
        let mut name = String::new();
        loop {
            match self.peek() {
                Some(c) if is_name_char(c) => {
                    self.bump();
                    name.push(c);
                }
                Some('\\') if is_valid_escape(self.peek(), self.peek_nth(1)) => {
                    self.bump();
                    name.push(self.consume_escape());
                }
                _ => return name,
            }
        }
    }

    fn consume_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn consume_numeric(&mut self, start: usize) -> CssToken<'a> {
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        self.consume_digits();
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.consume_digits();
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let next = self.peek_nth(1);
            let after = self.peek_nth(2);
            let signed = matches!(next, Some('+') | Some('-')) && after.is_some_and(|c| c.is_ascii_digit());
            if signed || next.is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
                if signed {
                    self.bump();
                }
                self.consume_digits();
            }
        }

        if starts_ident(self.peek(), self.peek_nth(1), self.peek_nth(2)) {
            let unit = self.consume_name();
            return self.token(CssTokenKind::Dimension, start, unit);
        }
        if self.peek() == Some('%') {
            self.bump();
            return self.token(CssTokenKind::Percentage, start, String::new());
        }
        self.token(CssTokenKind::Number, start, String::new())
    }

    fn consume_ident_like(&mut self, start: usize) -> CssToken<'a> {
        let name = self.consume_name();
        if self.peek() != Some('(') {
            return self.token(CssTokenKind::Ident, start, name);
        }
        self.bump();

        if name.eq_ignore_ascii_case("url") {
            // url("...") is a function taking a string
            let mut offset = 0;
            while self.peek_nth(offset).is_some_and(is_css_whitespace) {
                offset += 1;
            }
            if !matches!(self.peek_nth(offset), Some('"') | Some('\'')) {
                return self.consume_url(start);
            }
        }
        self.token(CssTokenKind::Function, start, name)
    }

    /// Consume an unquoted URL after `url(`
    fn consume_url(&mut self, start: usize) -> CssToken<'a> {
        while self.peek().is_some_and(is_css_whitespace) {
            self.bump();
        }
        let mut url = String::new();
        loop {
            match self.bump() {
                None | Some(')') => return self.token(CssTokenKind::Url, start, url),
                Some(c) if is_css_whitespace(c) => {
                    while self.peek().is_some_and(is_css_whitespace) {
                        self.bump();
                    }
                    match self.peek() {
                        None => return self.token(CssTokenKind::Url, start, url),
                        Some(')') => {
                            self.bump();
                            return self.token(CssTokenKind::Url, start, url);
                        }
                        Some(_) => return self.consume_bad_url(start),
                    }
                }
                Some('"') | Some('\'') | Some('(') => return self.consume_bad_url(start),
                Some(c) if c.is_ascii_control() => return self.consume_bad_url(start),
                Some('\\') => {
                    if self.peek().is_some_and(|c| !is_newline(c)) {
                        url.push(self.consume_escape());
                    } else {
                        return self.consume_bad_url(start);
                    }
                }
                Some(c) => url.push(c),
            }
        }
    }

    fn consume_bad_url(&mut self, start: usize) -> CssToken<'a> {
        loop {
            match self.bump() {
                None | Some(')') => break,
                Some('\\') => {
                    self.bump();
                }
                Some(_) => {}
            }
        }
        self.token(CssTokenKind::BadUrl, start, String::new())
    }

    fn consume_string(&mut self, start: usize, quote: char) -> CssToken<'a> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => break,
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some(c) if is_newline(c) => {
                    return self.token(CssTokenKind::BadString, start, value);
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        None => {}
                        Some('\r') => {
                            self.bump();
                            if self.peek() == Some('\n') {
                                self.bump();
                            }
                        }
                        Some(c) if is_newline(c) => {
                            self.bump();
                        }
                        Some(_) => value.push(self.consume_escape()),
                    }
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
        self.token(CssTokenKind::String, start, value)
    }

    /// Get the next token, or None at end of input
    pub fn next_token(&mut self) -> Option<CssToken<'a>> {
        self.skip_comments();
        let start = self.pos;
        let c = self.peek()?;
        let (c1, c2) = (self.peek_nth(1), self.peek_nth(2));

        let simple = |t: &mut Self, kind: CssTokenKind| {
            t.bump();
            t.token(kind, start, String::new())
        };

        let token = match c {
            c if is_css_whitespace(c) => {
                while self.peek().is_some_and(is_css_whitespace) {
                    self.bump();
                }
                self.token(CssTokenKind::Whitespace, start, String::new())
            }
            '"' | '\'' => {
                self.bump();
                self.consume_string(start, c)
            }
            '#' => {
                if c1.is_some_and(is_name_char) || is_valid_escape(c1, c2) {
                    self.bump();
                    let name = self.consume_name();
                    self.token(CssTokenKind::Hash, start, name)
                } else {
                    simple(self, CssTokenKind::Delim('#'))
                }
            }
            '(' => simple(self, CssTokenKind::OpenParen),
            ')' => simple(self, CssTokenKind::CloseParen),
            '[' => simple(self, CssTokenKind::OpenBracket),
            ']' => simple(self, CssTokenKind::CloseBracket),
            '{' => simple(self, CssTokenKind::OpenBrace),
            '}' => simple(self, CssTokenKind::CloseBrace),
            ',' => simple(self, CssTokenKind::Comma),
            ':' => simple(self, CssTokenKind::Colon),
            ';' => simple(self, CssTokenKind::Semicolon),
            '+' | '.' if starts_number(Some(c), c1, c2) => self.consume_numeric(start),
            '-' => {
                if starts_number(Some(c), c1, c2) {
                    self.consume_numeric(start)
                } else if c1 == Some('-') && c2 == Some('>') {
                    self.pos += 3;
                    self.token(CssTokenKind::Cdc, start, String::new())
                } else if starts_ident(Some(c), c1, c2) {
                    self.consume_ident_like(start)
                } else {
                    simple(self, CssTokenKind::Delim('-'))
                }
            }
            '<' if self.input[self.pos..].starts_with("<!--") => {
                self.pos += 4;
                self.token(CssTokenKind::Cdo, start, String::new())
            }
            '@' => {
                if starts_ident(c1, c2, self.peek_nth(3)) {
                    self.bump();
                    let name = self.consume_name();
                    self.token(CssTokenKind::AtKeyword, start, name)
                } else {
                    simple(self, CssTokenKind::Delim('@'))
                }
            }
            '\\' if is_valid_escape(Some(c), c1) => self.consume_ident_like(start),
            c if c.is_ascii_digit() => self.consume_numeric(start),
            c if is_name_start(c) => self.consume_ident_like(start),
            c => simple(self, CssTokenKind::Delim(c)),
        };
        Some(token)
    }
}

impl<'a> Iterator for CssTokenizer<'a> {
    type Item = CssToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
