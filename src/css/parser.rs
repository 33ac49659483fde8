//! Stylesheet Parser
//!
//! Builds the rule tree from CSS tokens. Parsing is iterative: `@media`
//! nesting lives on an explicit frame stack and function nesting in value
//! expressions on another, both with enforced limits. Malformed pieces are
//! dropped the way a browser recovers from them; only a nesting limit
//! fails the whole parse.

use super::ast::{Declaration, ExpressionMember, StyleRule, Stylesheet, TopLevelRule};
use super::escape::push_quoted;
use super::tokenizer::{CssToken, CssTokenKind, CssTokenizer};
use crate::error::{Result, SanitizeError};
use tracing::debug;

/// Deepest function nesting accepted in a declaration value
pub const MAX_FUNCTION_DEPTH: usize = 32;

/// Functions whose string arguments are resource URLs
const URL_FUNCTIONS: &[&str] = &["url", "image", "image-set", "-webkit-image-set"];

/// Parse a stylesheet, allowing `@media` nesting up to `max_depth`
pub fn parse_stylesheet(css: &str, max_depth: usize) -> Result<Stylesheet> {
    let tokens: Vec<CssToken<'_>> = CssTokenizer::new(css).collect();
    let mut parser = Parser::new(&tokens, max_depth);
    let rules = parser.parse_rules()?;
    Ok(Stylesheet { rules })
}

/// Parse the contents of a `style` attribute
pub fn parse_declaration_list(css: &str) -> Result<Vec<Declaration>> {
    let tokens: Vec<CssToken<'_>> = CssTokenizer::new(css).collect();
    let mut parser = Parser::new(&tokens, 0);
    parser.parse_declarations()
}

/// How a rule prelude ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreludeEnd {
    /// `{` consumed
    Block,
    /// `;` consumed
    Semicolon,
    /// `}` of an enclosing block reached, not consumed
    CloseBrace,
    Eof,
}

/// An open `@media` block
struct MediaFrame {
    query: String,
    rules: Vec<TopLevelRule>,
}

struct Parser<'t, 'a> {
    tokens: &'t [CssToken<'a>],
    pos: usize,
    max_depth: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn new(tokens: &'t [CssToken<'a>], max_depth: usize) -> Self {
        Parser {
            tokens,
            pos: 0,
            max_depth,
        }
    }

    #[inline]
    fn peek(&self) -> Option<&'t CssToken<'a>> {
        self.tokens.get(self.pos)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|t| t.kind == CssTokenKind::Whitespace) {
            self.pos += 1;
        }
    }

    fn parse_rules(&mut self) -> Result<Vec<TopLevelRule>> {
        let mut top: Vec<TopLevelRule> = Vec::new();
        let mut stack: Vec<MediaFrame> = Vec::new();

        while let Some(token) = self.peek() {
            match token.kind {
                CssTokenKind::Whitespace
                | CssTokenKind::Cdo
                | CssTokenKind::Cdc
                | CssTokenKind::Semicolon => self.pos += 1,

                CssTokenKind::CloseBrace => {
                    self.pos += 1;
                    if let Some(frame) = stack.pop() {
                        let media = TopLevelRule::Media {
                            query: frame.query,
                            rules: frame.rules,
                        };
                        current(&mut stack, &mut top).push(media);
                    }
                }

                CssTokenKind::AtKeyword => {
                    self.pos += 1;
                    let name = token.value.to_ascii_lowercase();
                    let (prelude, end) = self.consume_prelude();

                    match (name.as_str(), prelude) {
                        ("media", Some(query)) if end == PreludeEnd::Block => {
                            if stack.len() >= self.max_depth {
                                return Err(SanitizeError::NestingLimitExceeded {
                                    limit: self.max_depth,
                                });
                            }
                            stack.push(MediaFrame {
                                query,
                                rules: Vec::new(),
                            });
                        }
                        ("import" | "namespace", prelude) => {
                            if end == PreludeEnd::Block {
                                self.skip_block();
                            }
                            let prelude = prelude.unwrap_or_default();
                            let rule = if name == "import" {
                                TopLevelRule::Import(prelude)
                            } else {
                                TopLevelRule::Namespace(prelude)
                            };
                            current(&mut stack, &mut top).push(rule);
                        }
                        _ => {
                            debug!(at_rule = %name, "dropping unsupported at-rule");
                            if end == PreludeEnd::Block {
                                self.skip_block();
                            }
                        }
                    }
                }

                _ => {
                    let (selector, end) = self.consume_prelude();
                    if end == PreludeEnd::Block {
                        let declarations = self.parse_declarations()?;
                        if let Some(selector) = selector.filter(|s| !s.is_empty()) {
                            current(&mut stack, &mut top)
                                .push(TopLevelRule::Style(StyleRule { selector, declarations }));
                        }
                    }
                }
            }
        }

        // Blocks left open at end of input are closed
        while let Some(frame) = stack.pop() {
            let media = TopLevelRule::Media {
                query: frame.query,
                rules: frame.rules,
            };
            current(&mut stack, &mut top).push(media);
        }

        Ok(top)
    }

    /// Consume a rule prelude, returning its normalized text (None if it
    /// cannot be written back safely)
    fn consume_prelude(&mut self) -> (Option<String>, PreludeEnd) {
        let start = self.pos;
        let mut depth = 0usize;

        let end = loop {
            let Some(token) = self.peek() else {
                break PreludeEnd::Eof;
            };
            match token.kind {
                CssTokenKind::OpenBrace => break PreludeEnd::Block,
                CssTokenKind::Semicolon if depth == 0 => break PreludeEnd::Semicolon,
                CssTokenKind::CloseBrace => break PreludeEnd::CloseBrace,
                CssTokenKind::OpenParen | CssTokenKind::OpenBracket | CssTokenKind::Function => depth += 1,
                CssTokenKind::CloseParen | CssTokenKind::CloseBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        };

        let text = normalize_prelude(&self.tokens[start..self.pos]);
        if matches!(end, PreludeEnd::Block | PreludeEnd::Semicolon) {
            self.pos += 1;
        }
        (text, end)
    }

    /// Skip to the end of a block whose `{` was consumed
    fn skip_block(&mut self) {
        let mut depth = 1usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            match token.kind {
                CssTokenKind::OpenBrace => depth += 1,
                CssTokenKind::CloseBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Parse declarations up to and including the closing `}` (or end of input)
    fn parse_declarations(&mut self) -> Result<Vec<Declaration>> {
        let mut declarations = Vec::new();

        while let Some(token) = self.peek() {
            match token.kind {
                CssTokenKind::Whitespace | CssTokenKind::Semicolon => self.pos += 1,
                CssTokenKind::CloseBrace => {
                    self.pos += 1;
                    break;
                }
                CssTokenKind::Ident => {
                    self.pos += 1;
                    self.skip_whitespace();
                    if self.peek().is_some_and(|t| t.kind == CssTokenKind::Colon) {
                        self.pos += 1;
                        let (value, valid) = self.consume_value();
                        if valid {
                            if let Some(declaration) = build_declaration(&token.value, value)? {
                                declarations.push(declaration);
                            }
                        }
                    } else {
                        self.consume_value();
                    }
                }
                _ => {
                    // Nested rules and stray tokens are not declarations
                    self.consume_value();
                }
            }
        }

        Ok(declarations)
    }

    /// Consume a declaration value up to `;` (consumed), the end of a nested
    /// `{}` block (consumed) or `}` (not consumed). The flag is false if the
    /// value contained a block.
    fn consume_value(&mut self) -> (&'t [CssToken<'a>], bool) {
        let start = self.pos;
        let mut braces = 0usize;
        let mut valid = true;

        while let Some(token) = self.peek() {
            match token.kind {
                CssTokenKind::Semicolon if braces == 0 => {
                    let value = &self.tokens[start..self.pos];
                    self.pos += 1;
                    return (value, valid);
                }
                CssTokenKind::CloseBrace if braces == 0 => break,
                CssTokenKind::OpenBrace => {
                    braces += 1;
                    valid = false;
                }
                CssTokenKind::CloseBrace => {
                    braces -= 1;
                    if braces == 0 {
                        // A nested block ends the construct it belongs to
                        self.pos += 1;
                        return (&self.tokens[start..self.pos], valid);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }

        (&self.tokens[start..self.pos], valid)
    }
}

/// The rule list new rules go into: the innermost open `@media`, or the
/// stylesheet itself
fn current<'s>(stack: &'s mut [MediaFrame], top: &'s mut Vec<TopLevelRule>) -> &'s mut Vec<TopLevelRule> {
    match stack.last_mut() {
        Some(frame) => &mut frame.rules,
        None => top,
    }
}

fn is_combinator(token: &CssToken<'_>) -> bool {
    matches!(
        token.kind,
        CssTokenKind::Comma | CssTokenKind::Delim('>') | CssTokenKind::Delim('+') | CssTokenKind::Delim('~')
    )
}

/// Join prelude tokens with whitespace collapsed to one space and removed
/// around combinators. Broken strings and urls and a lone `\` would change
/// the meaning of the text after them, so they reject the prelude.
fn normalize_prelude(tokens: &[CssToken<'_>]) -> Option<String> {
    let mut out = String::new();
    let mut pending_space = false;
    let mut after_combinator = false;

    for token in tokens {
        match token.kind {
            CssTokenKind::Whitespace => {
                pending_space = true;
                continue;
            }
            CssTokenKind::BadString | CssTokenKind::BadUrl | CssTokenKind::Delim('\\') => return None,
            _ => {}
        }
        let combinator = is_combinator(token);
        if pending_space && !out.is_empty() && !after_combinator && !combinator {
            out.push(' ');
        }
        out.push_str(token.raw);
        pending_space = false;
        after_combinator = combinator;
    }
    Some(out)
}

/// Check that a decoded property name can be written back verbatim
fn is_plain_property(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii())
}

fn build_declaration(name: &str, tokens: &[CssToken<'_>]) -> Result<Option<Declaration>> {
    let property = name.to_ascii_lowercase();
    if !is_plain_property(&property) {
        return Ok(None);
    }

    let (tokens, important) = strip_important(tokens);
    let Some(value) = build_members(tokens)? else {
        return Ok(None);
    };
    if value.is_empty() {
        return Ok(None);
    }

    Ok(Some(Declaration {
        property,
        value,
        important,
    }))
}

/// Split a trailing `!important` off a value
fn strip_important<'t, 'a>(tokens: &'t [CssToken<'a>]) -> (&'t [CssToken<'a>], bool) {
    let significant: Vec<usize> = (0..tokens.len())
        .filter(|&i| tokens[i].kind != CssTokenKind::Whitespace)
        .collect();

    if let [.., bang, last] = significant[..] {
        if tokens[bang].kind == CssTokenKind::Delim('!')
            && tokens[last].kind == CssTokenKind::Ident
            && tokens[last].value.eq_ignore_ascii_case("important")
        {
            return (&tokens[..bang], true);
        }
    }
    (tokens, false)
}

/// A function whose arguments are being collected
struct FunctionFrame {
    /// Source name without '('
    name: String,
    /// String arguments are URLs
    takes_urls: bool,
    args: Vec<ExpressionMember>,
    literal: String,
}

impl FunctionFrame {
    fn new(name: String, decoded: &str) -> Self {
        let takes_urls = URL_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(decoded));
        FunctionFrame {
            name,
            takes_urls,
            args: Vec::new(),
            literal: String::new(),
        }
    }

    fn flush(&mut self) {
        if !self.literal.is_empty() {
            self.args.push(ExpressionMember::Literal(std::mem::take(&mut self.literal)));
        }
    }

    fn into_member(mut self) -> ExpressionMember {
        self.flush();
        // url("x") is the same reference as url(x)
        if self.name.eq_ignore_ascii_case("url") {
            if let [ExpressionMember::UriReference(_)] = self.args[..] {
                if let Some(uri) = self.args.pop() {
                    return uri;
                }
            }
        }
        ExpressionMember::FunctionCall {
            name: self.name,
            args: self.args,
        }
    }
}

/// Build value members from tokens. Returns None when the value holds
/// tokens that make the declaration invalid.
fn build_members(tokens: &[CssToken<'_>]) -> Result<Option<Vec<ExpressionMember>>> {
    let mut root = FunctionFrame::new(String::new(), "");
    let mut stack: Vec<FunctionFrame> = Vec::new();

    for token in tokens {
        let frame = stack.last_mut().unwrap_or(&mut root);
        match token.kind {
            CssTokenKind::Whitespace => frame.flush(),
            CssTokenKind::Comma => {
                frame.flush();
                frame.args.push(ExpressionMember::literal(","));
            }
            CssTokenKind::Url => {
                frame.flush();
                frame.args.push(ExpressionMember::UriReference(token.value.clone()));
            }
            CssTokenKind::String if frame.takes_urls => {
                frame.flush();
                frame.args.push(ExpressionMember::UriReference(token.value.clone()));
            }
            CssTokenKind::String => push_quoted(&mut frame.literal, &token.value),
            CssTokenKind::BadUrl | CssTokenKind::BadString => return Ok(None),
            // A lone backslash would escape whatever the writer puts next
            CssTokenKind::Delim('\\') => {}
            CssTokenKind::Function => {
                frame.flush();
                if stack.len() >= MAX_FUNCTION_DEPTH {
                    return Err(SanitizeError::NestingLimitExceeded {
                        limit: MAX_FUNCTION_DEPTH,
                    });
                }
                let name = token.raw.strip_suffix('(').unwrap_or(token.raw).to_string();
                stack.push(FunctionFrame::new(name, &token.value));
            }
            CssTokenKind::CloseParen => {
                let Some(done) = stack.pop() else {
                    return Ok(None);
                };
                let member = done.into_member();
                stack.last_mut().unwrap_or(&mut root).args.push(member);
            }
            _ => frame.literal.push_str(token.raw),
        }
    }

    // Functions left open at the end of the value are closed
    while let Some(done) = stack.pop() {
        let member = done.into_member();
        stack.last_mut().unwrap_or(&mut root).args.push(member);
    }

    root.flush();
    Ok(Some(root.args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(rule: &TopLevelRule) -> &StyleRule {
        match rule {
            TopLevelRule::Style(style) => style,
            other => panic!("expected style rule, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_stylesheet() {
        let sheet = parse_stylesheet("body { color: black; }\n.a > b , c { width: 10px !important }", 10).unwrap();
        assert_eq!(sheet.rules.len(), 2);
        assert_eq!(style(&sheet.rules[0]).selector, "body");
        let second = style(&sheet.rules[1]);
        assert_eq!(second.selector, ".a>b,c");
        assert!(second.declarations[0].important);
        assert_eq!(second.declarations[0].value, vec![ExpressionMember::literal("10px")]);
    }

    #[test]
    fn test_import_and_namespace_rules() {
        let sheet = parse_stylesheet("@import 'a.css'; @namespace svg url(x); p{color:red}", 10).unwrap();
        assert!(matches!(sheet.rules[0], TopLevelRule::Import(_)));
        assert!(matches!(sheet.rules[1], TopLevelRule::Namespace(_)));
        assert_eq!(sheet.rules.len(), 3);
    }

    #[test]
    fn test_unknown_at_rules_dropped() {
        let sheet = parse_stylesheet("@font-face { src: url(x) } @charset 'utf-8'; p{color:red}", 10).unwrap();
        assert_eq!(sheet.rules.len(), 1);
    }

    #[test]
    fn test_nested_media() {
        let sheet = parse_stylesheet("@media screen { @media (min-width: 1px) { p { color: red } } }", 10).unwrap();
        match &sheet.rules[0] {
            TopLevelRule::Media { query, rules } => {
                assert_eq!(query, "screen");
                assert!(matches!(rules[0], TopLevelRule::Media { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_media_nesting_limit() {
        let css = "@media a{".repeat(4) + "p{color:red}" + &"}".repeat(4);
        assert!(parse_stylesheet(&css, 4).is_ok());
        let err = parse_stylesheet(&css, 3).unwrap_err();
        assert!(matches!(err, SanitizeError::NestingLimitExceeded { limit: 3 }));
    }

    #[test]
    fn test_function_nesting_limit() {
        let value = "calc(".repeat(MAX_FUNCTION_DEPTH + 1);
        let css = format!("p{{width:{}}}", value);
        assert!(parse_stylesheet(&css, 10).is_err());
    }

    #[test]
    fn test_unclosed_blocks_closed_at_eof() {
        let sheet = parse_stylesheet("@media print { p { color: red", 10).unwrap();
        match &sheet.rules[0] {
            TopLevelRule::Media { rules, .. } => assert_eq!(style(&rules[0]).declarations.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_url_members() {
        let sheet = parse_stylesheet("a{background:url('x.png') no-repeat, url(y.png)}", 10).unwrap();
        let value = &style(&sheet.rules[0]).declarations[0].value;
        assert_eq!(
            value,
            &vec![
                ExpressionMember::UriReference("x.png".to_string()),
                ExpressionMember::literal("no-repeat"),
                ExpressionMember::literal(","),
                ExpressionMember::UriReference("y.png".to_string()),
            ]
        );
    }

    #[test]
    fn test_function_members() {
        let decls = parse_declaration_list("width: calc(100% - 2px); fill: rgb(1, 2, 3)").unwrap();
        assert_eq!(decls.len(), 2);
        match &decls[0].value[0] {
            ExpressionMember::FunctionCall { name, args } => {
                assert_eq!(name, "calc");
                assert_eq!(args.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_escaped_function_name_kept_raw() {
        let decls = parse_declaration_list("width: \\65 xpression(alert(1))").unwrap();
        match &decls[0].value[0] {
            ExpressionMember::FunctionCall { name, .. } => assert_eq!(name, "\\65 xpression"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_declarations_dropped() {
        let decls = parse_declaration_list("color; : red; width: url(a b); height: 1px; a\\:b: 2").unwrap();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].property, "height");
    }

    #[test]
    fn test_nested_block_in_declarations_skipped() {
        let sheet = parse_stylesheet("p { color: red; &:hover { color: blue } width: 1px }", 10).unwrap();
        let decls = &style(&sheet.rules[0]).declarations;
        assert_eq!(decls.len(), 2);
    }

    #[test]
    fn test_strings_closed_and_lone_backslash_dropped() {
        let decls = parse_declaration_list("content: 'a\\'b' \"open; width: 1px\\").unwrap();
        assert_eq!(
            decls[0].value,
            vec![
                ExpressionMember::literal("\"a'b\""),
                ExpressionMember::literal("\"open; width: 1px\""),
            ]
        );

        let decls = parse_declaration_list("width: 1px\\").unwrap();
        assert_eq!(decls[0].value, vec![ExpressionMember::literal("1px")]);
    }

    #[test]
    fn test_prelude_with_lone_backslash_dropped() {
        let sheet = parse_stylesheet("a\\\n{color:red} p{color:blue}", 10).unwrap();
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(style(&sheet.rules[0]).selector, "p");
    }

    #[test]
    fn test_property_lowercased() {
        let decls = parse_declaration_list("COLOR: Red").unwrap();
        assert_eq!(decls[0].property, "color");
        assert_eq!(decls[0].value, vec![ExpressionMember::literal("Red")]);
    }
}
