//! Stylesheet rule tree

/// A parsed stylesheet
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    pub rules: Vec<TopLevelRule>,
}

/// A rule at stylesheet level or inside `@media`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopLevelRule {
    /// `@import` with its prelude text
    Import(String),
    /// `@namespace` with its prelude text
    Namespace(String),
    Media {
        query: String,
        rules: Vec<TopLevelRule>,
    },
    Style(StyleRule),
}

/// `selector { declarations }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    /// Selector source text, whitespace normalized
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

/// `property: value [!important]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name
    pub property: String,
    pub value: Vec<ExpressionMember>,
    pub important: bool,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: Vec<ExpressionMember>) -> Self {
        Declaration {
            property: property.into(),
            value,
            important: false,
        }
    }
}

/// One space- or comma-separated piece of a declaration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionMember {
    /// Source text of adjacent tokens, e.g. `10px`, `#fff`, `","`
    Literal(String),
    /// Decoded `url()` target
    UriReference(String),
    /// Function with its source name (without '(')
    FunctionCall {
        name: String,
        args: Vec<ExpressionMember>,
    },
}

impl ExpressionMember {
    pub fn literal(text: impl Into<String>) -> Self {
        ExpressionMember::Literal(text.into())
    }

    pub fn is_comma(&self) -> bool {
        matches!(self, ExpressionMember::Literal(text) if text == ",")
    }
}
