//! Canonical CSS writer
//!
//! Whitespace-minimized output: `sel{prop:value;prop:value}`. A `@media`
//! block with nothing left inside is omitted.

use super::ast::{Declaration, ExpressionMember, Stylesheet, TopLevelRule};
use super::escape::push_quoted;

/// Serialize a stylesheet
pub fn write_stylesheet(sheet: &Stylesheet) -> String {
    // (remaining rules, output so far, media query of this level)
    let mut stack: Vec<(std::slice::Iter<'_, TopLevelRule>, String, Option<&str>)> =
        vec![(sheet.rules.iter(), String::new(), None)];

    loop {
        let Some((rules, out, _)) = stack.last_mut() else {
            return String::new();
        };

        match rules.next() {
            Some(TopLevelRule::Style(rule)) => {
                out.push_str(&rule.selector);
                out.push('{');
                write_declarations_into(out, &rule.declarations);
                out.push('}');
            }
            Some(TopLevelRule::Media { query, rules }) => {
                stack.push((rules.iter(), String::new(), Some(query.as_str())));
            }
            // Never serialized
            Some(TopLevelRule::Import(_)) | Some(TopLevelRule::Namespace(_)) => {}
            None => {
                let Some((_, body, query)) = stack.pop() else {
                    return String::new();
                };
                match (query, stack.last_mut()) {
                    (Some(query), Some((_, parent, _))) => {
                        if !body.is_empty() {
                            parent.push_str("@media ");
                            parent.push_str(query);
                            parent.push('{');
                            parent.push_str(&body);
                            parent.push('}');
                        }
                    }
                    _ => return body,
                }
            }
        }
    }
}

/// Serialize a declaration list, as found in a `style` attribute
pub fn write_declarations(declarations: &[Declaration]) -> String {
    let mut out = String::new();
    write_declarations_into(&mut out, declarations);
    out
}

fn write_declarations_into(out: &mut String, declarations: &[Declaration]) {
    for (i, declaration) in declarations.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(&declaration.property);
        out.push(':');
        write_members(out, &declaration.value);
        if declaration.important {
            out.push_str("!important");
        }
    }
}

/// Serialize one member, as it appears in output
pub fn member_to_string(member: &ExpressionMember) -> String {
    let mut out = String::new();
    write_member(&mut out, member);
    out
}

fn write_members(out: &mut String, members: &[ExpressionMember]) {
    for (i, member) in members.iter().enumerate() {
        if i > 0 && !member.is_comma() && !members[i - 1].is_comma() {
            out.push(' ');
        }
        write_member(out, member);
    }
}

fn write_member(out: &mut String, member: &ExpressionMember) {
    match member {
        ExpressionMember::Literal(text) => out.push_str(text),
        ExpressionMember::UriReference(uri) => {
            out.push_str("url(");
            push_quoted(out, uri);
            out.push(')');
        }
        ExpressionMember::FunctionCall { name, args } => {
            out.push_str(name);
            out.push('(');
            write_members(out, args);
            out.push(')');
        }
    }
}
