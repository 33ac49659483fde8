//! XML Tokenizer - State machine for XML token extraction
//!
//! Implements a pull-parser style tokenizer that extracts XML tokens:
//! - Element start/end tags
//! - Text content
//! - CDATA sections
//! - Comments
//! - Processing instructions
//! - DOCTYPE declarations (skipped over, never interpreted)
//! - Entity references
//!
//! The tokenizer can run over a complete document or over a prefix of a
//! stream. On a prefix it reports `TokenizeError::NeedMoreInput` when a
//! construct runs past the end of the available data, and the caller
//! retries once more input has arrived.

use super::scanner::Scanner;
use thiserror::Error;

/// Longest text run emitted from a partial buffer before more input arrives
pub const MAX_TEXT_RUN: usize = 8192;

/// Type of XML token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element start tag: <element>
    StartTag,
    /// Element end tag: </element>
    EndTag,
    /// Empty element: <element/>
    EmptyTag,
    /// Text content (never contains '&')
    Text,
    /// CDATA section: <![CDATA[...]]>
    CData,
    /// Comment: <!--...-->
    Comment,
    /// Processing instruction: <?target ...?>
    ProcessingInstruction,
    /// XML declaration: <?xml ...?>
    XmlDeclaration,
    /// DOCTYPE declaration, including any internal subset
    DocType,
    /// Entity or character reference: &name; / &#...;
    EntityRef,
}

/// A parsed XML token
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Span in the tokenizer's input (start, end)
    pub span: (usize, usize),
    /// For tags and PIs: the name or target. For references: the name.
    pub name: Option<&'a str>,
    /// For start tags: raw attribute text. For text/CDATA/comments/PIs/DOCTYPE: the content.
    pub content: Option<&'a str>,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, span: (usize, usize)) -> Self {
        Token {
            kind,
            span,
            name: None,
            content: None,
        }
    }

    fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    fn with_content(mut self, content: &'a str) -> Self {
        self.content = Some(content);
        self
    }
}

/// Malformed input, with the byte offset where it was detected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {position}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

/// Why the tokenizer could not produce a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    /// The construct continues past the available input
    NeedMoreInput,
    /// The input is not well-formed
    Malformed(ParseError),
}

impl From<ParseError> for TokenizeError {
    fn from(e: ParseError) -> Self {
        TokenizeError::Malformed(e)
    }
}

type TokenResult<'a> = Result<Option<Token<'a>>, TokenizeError>;

/// XML tokenizer implementing a pull-parser pattern
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    /// True when no input follows the end of `scanner`'s slice
    is_final: bool,
    /// Document offset of the slice, for error positions
    base: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer over a complete document
    pub fn new(input: &'a str) -> Self {
        Self::partial(input, 0, true)
    }

    /// Create a tokenizer over a window of a stream starting at document
    /// offset `base`
    pub fn partial(input: &'a str, base: usize, is_final: bool) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            is_final,
            base,
        }
    }

    /// Get the current position within the input slice
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Skip a leading byte order mark
    pub fn skip_bom(&mut self) {
        if self.scanner.position() == 0 && self.scanner.starts_with("\u{FEFF}") {
            self.scanner.advance('\u{FEFF}'.len_utf8());
        }
    }

    fn error(&self, message: impl Into<String>, at: usize) -> TokenizeError {
        TokenizeError::Malformed(ParseError::new(message, self.base + at))
    }

    /// A construct starting at `start` has no terminator in the input
    fn truncated(&mut self, start: usize, what: &str) -> TokenizeError {
        self.scanner.set_position(start);
        if self.is_final {
            self.error(format!("Unexpected end of input inside {}", what), start)
        } else {
            TokenizeError::NeedMoreInput
        }
    }

    /// Get the next token, or None at end of input
    pub fn next_token(&mut self) -> TokenResult<'a> {
        if self.scanner.is_eof() {
            return Ok(None);
        }

        match self.scanner.peek() {
            Some(b'<') => self.parse_markup(),
            Some(b'&') => self.parse_reference(),
            Some(_) => self.parse_text(),
            None => Ok(None),
        }
    }

    /// Parse character data up to the next '<' or '&'
    fn parse_text(&mut self) -> TokenResult<'a> {
        let start = self.scanner.position();
        let end = match self.scanner.find_text_boundary() {
            Some(end) => end,
            None if self.is_final => self.scanner.len(),
            None => {
                // Emit long runs in pieces so a stream of text stays bounded
                let available = self.scanner.len() - start;
                if available < MAX_TEXT_RUN {
                    return Err(TokenizeError::NeedMoreInput);
                }
                let input = self.scanner.slice(0, self.scanner.len());
                let mut end = start + MAX_TEXT_RUN;
                while !input.is_char_boundary(end) {
                    end -= 1;
                }
                end
            }
        };

        self.scanner.set_position(end);
        Ok(Some(
            Token::new(TokenKind::Text, (start, end)).with_content(self.scanner.slice(start, end)),
        ))
    }

    /// Parse an entity or character reference
    fn parse_reference(&mut self) -> TokenResult<'a> {
        let start = self.scanner.position();
        self.scanner.advance(1); // Skip '&'

        let name_start = self.scanner.position();
        if self.scanner.peek() == Some(b'#') {
            self.scanner.advance(1);
            while matches!(self.scanner.peek(), Some(b) if b.is_ascii_alphanumeric()) {
                self.scanner.advance(1);
            }
        } else if self.scanner.read_name().is_none() {
            if self.scanner.is_eof() {
                return Err(self.truncated(start, "reference"));
            }
            return Err(self.error("Bare '&' not allowed in content", start));
        }
        let name_end = self.scanner.position();

        match self.scanner.peek() {
            Some(b';') => {
                self.scanner.advance(1);
                let name = self.scanner.slice(name_start, name_end);
                if name == "#" {
                    return Err(self.error("Empty character reference", start));
                }
                Ok(Some(
                    Token::new(TokenKind::EntityRef, (start, self.scanner.position())).with_name(name),
                ))
            }
            None => Err(self.truncated(start, "reference")),
            Some(_) => Err(self.error("Reference is missing ';'", start)),
        }
    }

    /// Parse markup starting with '<'
    fn parse_markup(&mut self) -> TokenResult<'a> {
        let start = self.scanner.position();

        // Every construct ends with '>'; wait for one before looking closer
        if self.scanner.find_byte(b'>').is_none() {
            return Err(self.truncated(start, "markup"));
        }

        match self.scanner.peek_at(1) {
            Some(b'/') => self.parse_end_tag(start),
            Some(b'!') => self.parse_bang_markup(start),
            Some(b'?') => self.parse_pi(start),
            Some(_) => self.parse_start_tag(start),
            None => Err(self.truncated(start, "markup")),
        }
    }

    /// Parse a start tag or empty element tag
    fn parse_start_tag(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.advance(1); // Skip '<'

        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => {
                return Err(self.error(
                    "Invalid element name: must start with letter, underscore, or colon",
                    start,
                ))
            }
        };
        let attrs_start = self.scanner.position();

        // Find the end of the tag, handling quoted attributes
        let end = match self.scanner.find_tag_end_quoted() {
            Some(end) => end,
            None => return Err(self.truncated(start, "start tag")),
        };

        let is_empty = end > attrs_start && self.scanner.slice(end - 1, end) == "/";
        let attrs_end = if is_empty { end - 1 } else { end };

        self.scanner.set_position(end + 1);

        let kind = if is_empty { TokenKind::EmptyTag } else { TokenKind::StartTag };
        Ok(Some(
            Token::new(kind, (start, end + 1))
                .with_name(name)
                .with_content(self.scanner.slice(attrs_start, attrs_end)),
        ))
    }

    /// Parse an end tag
    fn parse_end_tag(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.advance(2); // Skip '</'

        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => {
                return Err(self.error(
                    "Invalid element name in end tag: must start with letter, underscore, or colon",
                    start,
                ))
            }
        };

        self.scanner.skip_whitespace();
        match self.scanner.peek() {
            Some(b'>') => {}
            None => return Err(self.truncated(start, "end tag")),
            Some(_) => return Err(self.error("End tag cannot have attributes or other content", start)),
        }
        self.scanner.advance(1);

        Ok(Some(
            Token::new(TokenKind::EndTag, (start, self.scanner.position())).with_name(name),
        ))
    }

    /// Parse markup starting with '<!' (comment, CDATA, DOCTYPE)
    fn parse_bang_markup(&mut self, start: usize) -> TokenResult<'a> {
        if self.scanner.starts_with("<!--") {
            self.parse_comment(start)
        } else if self.scanner.starts_with("<![CDATA[") {
            self.parse_cdata(start)
        } else if self.scanner.starts_with("<!DOCTYPE") {
            self.parse_doctype(start)
        } else if !self.is_final && "<!DOCTYPE".starts_with(self.scanner.remaining())
            || !self.is_final && "<![CDATA[".starts_with(self.scanner.remaining())
        {
            Err(TokenizeError::NeedMoreInput)
        } else {
            Err(self.error("Invalid declaration - expected comment, CDATA, or DOCTYPE", start))
        }
    }

    /// Parse a comment <!--...-->
    fn parse_comment(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.advance(4); // Skip '<!--'
        let content_start = self.scanner.position();

        let end = match self.scanner.find_str("-->") {
            Some(end) => end,
            None => return Err(self.truncated(start, "comment")),
        };
        let content = self.scanner.slice(content_start, end);
        if content.contains("--") || content.ends_with('-') {
            return Err(self.error("'--' not allowed inside comment", start));
        }

        self.scanner.set_position(end + 3);
        Ok(Some(
            Token::new(TokenKind::Comment, (start, end + 3)).with_content(content),
        ))
    }

    /// Parse a CDATA section <![CDATA[...]]>
    fn parse_cdata(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.advance(9); // Skip '<![CDATA['
        let content_start = self.scanner.position();

        let end = match self.scanner.find_str("]]>") {
            Some(end) => end,
            None => return Err(self.truncated(start, "CDATA section")),
        };

        self.scanner.set_position(end + 3);
        Ok(Some(
            Token::new(TokenKind::CData, (start, end + 3))
                .with_content(self.scanner.slice(content_start, end)),
        ))
    }

    /// Parse a DOCTYPE declaration.
    ///
    /// The declaration is only delimited, never interpreted: quoted
    /// literals, the bracketed internal subset, and comments inside it are
    /// stepped over so a '>' inside any of them does not end the token.
    fn parse_doctype(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.advance(9); // Skip '<!DOCTYPE'

        let mut subset_depth = 0usize;
        let mut quote: Option<u8> = None;

        while let Some(b) = self.scanner.peek() {
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                self.scanner.advance(1);
                continue;
            }

            match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' => subset_depth += 1,
                b']' => subset_depth = subset_depth.saturating_sub(1),
                b'<' if subset_depth > 0 && self.scanner.starts_with("<!--") => {
                    match self.scanner.find_str("-->") {
                        Some(end) => {
                            self.scanner.set_position(end + 3);
                            continue;
                        }
                        None => return Err(self.truncated(start, "DOCTYPE")),
                    }
                }
                b'>' if subset_depth == 0 => {
                    let content = self.scanner.slice(start + 2, self.scanner.position());
                    self.scanner.advance(1);
                    return Ok(Some(
                        Token::new(TokenKind::DocType, (start, self.scanner.position()))
                            .with_content(content),
                    ));
                }
                _ => {}
            }
            self.scanner.advance(1);
        }

        Err(self.truncated(start, "DOCTYPE"))
    }

    /// Parse a processing instruction or the XML declaration
    fn parse_pi(&mut self, start: usize) -> TokenResult<'a> {
        self.scanner.advance(2); // Skip '<?'

        let target = match self.scanner.read_name() {
            Some(target) => target,
            None => return Err(self.error("Processing instruction requires a target name", start)),
        };

        let end = match self.scanner.find_str("?>") {
            Some(end) => end,
            None => return Err(self.truncated(start, "processing instruction")),
        };

        let data_start = self.scanner.position();
        let data = self.scanner.slice(data_start, end);
        if !data.is_empty() && !data.starts_with([' ', '\t', '\n', '\r']) {
            return Err(self.error("Whitespace required after processing instruction target", start));
        }
        self.scanner.set_position(end + 2);

        // The declaration keeps its leading whitespace for attribute parsing
        let (kind, content) = if target == "xml" {
            (TokenKind::XmlDeclaration, data)
        } else if target.eq_ignore_ascii_case("xml") {
            return Err(self.error("Processing instruction target 'xml' is reserved", start));
        } else {
            (
                TokenKind::ProcessingInstruction,
                data.trim_start_matches([' ', '\t', '\n', '\r']),
            )
        };

        Ok(Some(
            Token::new(kind, (start, end + 2))
                .with_name(target)
                .with_content(content),
        ))
    }
}
