//! Rule tree sanitization
//!
//! Walks the rule tree with an explicit work list. Import and namespace
//! rules are removed, style rules with a dangerous selector are removed,
//! and declarations holding dangerous values are neutralized in place.

use super::ast::{Declaration, ExpressionMember, Stylesheet, TopLevelRule};
use super::escape::decode_css_escapes;
use super::options::SanitizationOptions;
use super::writer::member_to_string;
use crate::patterns::{
    contains_dangerous_content, is_neutralized_property, is_safe_property, is_uri_safe, safe_default,
};
use tracing::debug;

/// Sanitize a stylesheet in place
pub fn sanitize_stylesheet(sheet: &mut Stylesheet, options: &SanitizationOptions) {
    let mut work: Vec<&mut Vec<TopLevelRule>> = vec![&mut sheet.rules];

    while let Some(rules) = work.pop() {
        rules.retain_mut(|rule| keep_rule(rule, options));
        for rule in rules {
            if let TopLevelRule::Media { rules: nested, .. } = rule {
                work.push(nested);
            }
        }
    }
}

/// Sanitize one rule's own content; false if the rule must be removed.
/// Media rule children are handled by the caller's work list.
fn keep_rule(rule: &mut TopLevelRule, options: &SanitizationOptions) -> bool {
    match rule {
        TopLevelRule::Import(prelude) | TopLevelRule::Namespace(prelude) => {
            debug!(prelude = %prelude, "dropping import/namespace rule");
            false
        }
        TopLevelRule::Media { query, .. } => {
            if contains_dangerous_content(&decode_css_escapes(query)) {
                debug!(query = %query, "dropping media rule with dangerous query");
                return false;
            }
            true
        }
        TopLevelRule::Style(style) => {
            if contains_dangerous_content(&decode_css_escapes(&style.selector)) {
                debug!(selector = %style.selector, "dropping rule with dangerous selector");
                return false;
            }
            sanitize_declarations(&mut style.declarations, options);
            !style.declarations.is_empty()
        }
    }
}

/// Sanitize a declaration list in place
pub fn sanitize_declarations(declarations: &mut Vec<Declaration>, options: &SanitizationOptions) {
    declarations.retain_mut(|declaration| {
        if options.strict_property_whitelist() && !is_safe_property(&declaration.property) {
            debug!(property = %declaration.property, "dropping property outside whitelist");
            return false;
        }

        let dangerous = is_neutralized_property(&declaration.property)
            || declaration
                .value
                .iter()
                .any(|member| is_dangerous_member(member, options));

        if dangerous {
            let replacement = safe_default(&declaration.property);
            debug!(property = %declaration.property, replacement, "neutralizing declaration");
            declaration.value = vec![ExpressionMember::literal(replacement)];
        }
        true
    });
}

/// Check a value member, including every member nested in function arguments
fn is_dangerous_member(member: &ExpressionMember, options: &SanitizationOptions) -> bool {
    let mut pending = vec![member];

    while let Some(member) = pending.pop() {
        match member {
            ExpressionMember::UriReference(uri) => {
                if !(options.allow_uris() && is_uri_safe(uri)) {
                    return true;
                }
            }
            ExpressionMember::Literal(text) => {
                if contains_dangerous_content(&decode_css_escapes(text)) {
                    return true;
                }
            }
            ExpressionMember::FunctionCall { name, args } => {
                // A url() that did not reduce to a single reference is malformed
                if decode_css_escapes(name).eq_ignore_ascii_case("url") {
                    return true;
                }
                if contains_dangerous_content(&decode_css_escapes(&member_to_string(member))) {
                    return true;
                }
                pending.extend(args.iter());
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::parser::{parse_declaration_list, parse_stylesheet};
    use crate::css::writer::{write_declarations, write_stylesheet};

    fn run(css: &str, options: &SanitizationOptions) -> String {
        let mut sheet = parse_stylesheet(css, options.max_nesting_depth()).unwrap();
        sanitize_stylesheet(&mut sheet, options);
        write_stylesheet(&sheet)
    }

    fn run_default(css: &str) -> String {
        run(css, &SanitizationOptions::default())
    }

    #[test]
    fn test_javascript_url_neutralized() {
        assert_eq!(
            run_default("body{background:url('javascript:alert(1)')}"),
            "body{background:none}"
        );
    }

    #[test]
    fn test_uris_blocked_by_default() {
        assert_eq!(run_default("p{background-image:url(a.png)}"), "p{background-image:none}");
    }

    #[test]
    fn test_safe_uris_allowed_with_option() {
        let options = SanitizationOptions::builder().allow_uris(true).build().unwrap();
        assert_eq!(
            run("p{background-image:url(a.png)}", &options),
            "p{background-image:url(\"a.png\")}"
        );
        assert_eq!(
            run("p{background-image:url(javascript:x)}", &options),
            "p{background-image:none}"
        );
    }

    #[test]
    fn test_nested_uri_in_function_checked() {
        assert_eq!(
            run_default("p{background-image:image-set(url(a.png) 1x)}"),
            "p{background-image:none}"
        );
    }

    #[test]
    fn test_escaped_expression_neutralized() {
        let out = run_default("p{width:\\65 xpression(alert(1))}");
        assert_eq!(out, "p{width:initial}");
    }

    #[test]
    fn test_color_default() {
        assert_eq!(run_default("p{stop-color:expression(x)}"), "p{stop-color:transparent}");
        assert_eq!(run_default("p{content:'<script>'}"), "p{content:normal}");
    }

    #[test]
    fn test_dangerous_selector_drops_rule() {
        assert_eq!(run_default("a[href^='javascript:']{color:red}p{color:blue}"), "p{color:blue}");
    }

    #[test]
    fn test_import_and_namespace_dropped() {
        assert_eq!(run_default("@namespace svg url(x);@\\69 mport 'x';p{color:red}"), "p{color:red}");
    }

    #[test]
    fn test_behavior_properties_neutralized() {
        assert_eq!(run_default("p{behavior:x;-moz-binding:y}"), "p{behavior:initial;-moz-binding:initial}");
    }

    #[test]
    fn test_strict_whitelist() {
        let options = SanitizationOptions::builder()
            .strict_property_whitelist(true)
            .build()
            .unwrap();
        assert_eq!(run("p{color:red;cursor:pointer}", &options), "p{color:red}");
        assert_eq!(run("p{cursor:pointer}", &options), "");
    }

    #[test]
    fn test_media_rules_sanitized() {
        assert_eq!(
            run_default("@media screen{p{color:red;width:expression(1)}@import 'x';}"),
            "@media screen{p{color:red;width:initial}}"
        );
    }

    #[test]
    fn test_important_kept_on_neutralized() {
        assert_eq!(
            run_default("p{background:url(x) !important}"),
            "p{background:none!important}"
        );
    }

    #[test]
    fn test_declaration_list() {
        let options = SanitizationOptions::default();
        let mut declarations = parse_declaration_list("fill: red; stroke: url(http://evil/x)").unwrap();
        sanitize_declarations(&mut declarations, &options);
        assert_eq!(write_declarations(&declarations), "fill:red;stroke:initial");
    }
}
