//! Classification Tables
//!
//! Immutable name and substring sets shared by the markup filter, the CSS
//! sanitizer and the detection predicates. All comparisons are ASCII
//! case-insensitive; every table entry is lowercase.

/// Elements removed together with their whole subtree
pub const UNSAFE_ELEMENTS: &[&str] = &["script", "foreignobject", "iframe", "embed", "object"];

/// Attributes (local names) that reference another resource
pub const REFERENCE_ATTRIBUTES: &[&str] = &["href", "src", "data"];

/// URI schemes that execute script when followed
pub const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:"];

/// CSS function names that execute script or bind behavior
pub const DANGEROUS_FUNCTIONS: &[&str] = &["expression", "javascript", "behavior", "-moz-binding", "binding"];

/// URI schemes never allowed in CSS values
pub const DANGEROUS_PROTOCOLS: &[&str] = &["javascript:", "vbscript:", "data:", "file:", "ftp:"];

/// Substrings that mark markup or script smuggled into CSS
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    "<script",
    "<iframe",
    "<object",
    "<embed",
    "<form",
    "<input",
    "<textarea",
    "<select",
    "<button",
    "<link",
    "<meta",
    "<base",
    "srcdoc=",
    "onload=",
    "onerror=",
    "onclick=",
    "eval(",
    "@import",
];

/// Properties allowed when the strict property whitelist is enabled
pub const SAFE_PROPERTIES: &[&str] = &[
    "color",
    "background-color",
    "border-color",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "text-align",
    "text-decoration",
    "margin",
    "padding",
    "border",
    "border-width",
    "border-style",
    "width",
    "height",
    "display",
    "position",
    "top",
    "left",
    "right",
    "bottom",
    "z-index",
    "opacity",
    "visibility",
    "overflow",
    "float",
    "clear",
    "line-height",
];

/// Properties whose value is always replaced, whatever it holds
pub const NEUTRALIZED_PROPERTIES: &[&str] = &["behavior", "-moz-binding"];

#[inline]
fn contains_ignore_case(set: &[&str], name: &str) -> bool {
    set.iter().any(|entry| entry.eq_ignore_ascii_case(name))
}

/// Check an element's local name against the unsafe set
pub fn is_unsafe_element(local_name: &str) -> bool {
    contains_ignore_case(UNSAFE_ELEMENTS, local_name)
}

/// Check whether an element's local name is `style`
pub fn is_style_element(local_name: &str) -> bool {
    local_name.eq_ignore_ascii_case("style")
}

pub fn is_safe_property(property: &str) -> bool {
    contains_ignore_case(SAFE_PROPERTIES, property)
}

pub fn is_neutralized_property(property: &str) -> bool {
    contains_ignore_case(NEUTRALIZED_PROPERTIES, property)
}

/// Lowercase a value with ASCII whitespace and control characters removed,
/// the form browsers effectively read a URI scheme in
fn scheme_form(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Check whether a value begins with a script-capable scheme
pub fn starts_with_script_scheme(value: &str) -> bool {
    let normalized = scheme_form(value);
    SCRIPT_SCHEMES.iter().any(|scheme| normalized.starts_with(scheme))
}

/// Check whether a reference stays inside the document: a fragment,
/// a `data:` URI, or empty (the document itself)
pub fn is_local_reference(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || scheme_form(trimmed).starts_with("data:")
}

/// Find the targets of every `url(...)` in a value
pub fn url_targets(value: &str) -> Vec<&str> {
    let lower = value.to_ascii_lowercase();
    let mut targets = Vec::new();
    let mut from = 0;

    while let Some(found) = lower[from..].find("url(") {
        let start = from + found + 4;
        let end = lower[start..].find(')').map_or(value.len(), |e| start + e);
        let target = value[start..end]
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim();
        targets.push(target);
        from = end.min(value.len());
        if from >= value.len() {
            break;
        }
    }
    targets
}

/// Check whether a value holds a `url(...)` leading outside the document
pub fn contains_external_url(value: &str) -> bool {
    url_targets(value).into_iter().any(|target| !is_local_reference(target))
}

/// Classification of one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeVerdict {
    Keep,
    /// `on*` event handler
    EventHandler,
    /// Value (or a `values` entry) starts with a script scheme
    ScriptScheme,
    /// Reference attribute pointing outside the document
    ExternalReference,
    /// Presentation value with an external `url(...)`
    ExternalUrl,
    /// `style` attribute, which must go through the CSS sanitizer
    Style,
}

/// Classify an attribute by its local name and value
pub fn classify_attribute(local_name: &str, value: &str) -> AttributeVerdict {
    let name = local_name.to_ascii_lowercase();

    if name.starts_with("on") {
        return AttributeVerdict::EventHandler;
    }
    if starts_with_script_scheme(value)
        || (name == "values" && value.split(';').any(starts_with_script_scheme))
    {
        return AttributeVerdict::ScriptScheme;
    }
    if REFERENCE_ATTRIBUTES.contains(&name.as_str()) && !is_local_reference(value) {
        return AttributeVerdict::ExternalReference;
    }
    if name == "style" {
        return AttributeVerdict::Style;
    }
    if contains_external_url(value) {
        return AttributeVerdict::ExternalUrl;
    }
    AttributeVerdict::Keep
}

/// Scan (already escape-decoded) CSS text for dangerous substrings
pub fn contains_dangerous_content(text: &str) -> bool {
    let lower = text.to_lowercase();

    DANGEROUS_FUNCTIONS.iter().any(|func| {
        lower
            .match_indices(func)
            .any(|(i, _)| lower[i + func.len()..].starts_with('('))
    }) || DANGEROUS_PROTOCOLS.iter().any(|protocol| lower.contains(protocol))
        || DANGEROUS_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Check whether a CSS `url()` target may be kept
pub fn is_uri_safe(uri: &str) -> bool {
    let normalized = scheme_form(uri);

    if normalized.starts_with("data:") {
        return !normalized.contains("javascript") && !normalized.contains("<script");
    }
    !DANGEROUS_PROTOCOLS.iter().any(|protocol| normalized.starts_with(protocol))
}

/// Replacement value for a neutralized declaration
pub fn safe_default(property: &str) -> &'static str {
    let property = property.to_ascii_lowercase();
    match property.as_str() {
        "background" | "background-image" => "none",
        "content" => "normal",
        p if p.ends_with("color") => "transparent",
        _ => "initial",
    }
}
