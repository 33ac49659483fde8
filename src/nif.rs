//! Elixir NIF bindings
//!
//! Markup functions return `{:ok, value}` or `{:error, reason}`; CSS
//! sanitization never fails and returns a plain binary.

use crate::core::tokenizer::ParseError;
use crate::error::Result;
use crate::{detect, strategy, SanitizationOptions, SvgSanitizer};
use rustler::types::atom::{error, ok};
use rustler::{Binary, Encoder, Env, NifResult, Term};

fn to_term<'a, T: Encoder>(env: Env<'a>, result: Result<T>) -> Term<'a> {
    match result {
        Ok(value) => (ok(), value).encode(env),
        Err(e) => (error(), e.to_string()).encode(env),
    }
}

fn as_text<'b>(input: &'b Binary<'_>) -> Result<&'b str> {
    std::str::from_utf8(input.as_slice())
        .map_err(|e| ParseError::new("Invalid UTF-8 sequence", e.valid_up_to()).into())
}

// ============================================================================
// Sanitization
// ============================================================================

/// Sanitize one SVG/XML document
#[rustler::nif(schedule = "DirtyCpu")]
fn sanitize<'a>(env: Env<'a>, input: Binary<'a>) -> NifResult<Term<'a>> {
    let result = as_text(&input).and_then(|text| SvgSanitizer::default().sanitize_str(text));
    Ok(to_term(env, result))
}

/// Sanitize stylesheet text with default options
#[rustler::nif]
fn sanitize_css(css: &str) -> String {
    crate::css::sanitize_css(css, &SanitizationOptions::default())
}

/// Sanitize many documents across the Rayon pool
#[rustler::nif(schedule = "DirtyCpu")]
fn sanitize_batch<'a>(env: Env<'a>, inputs: Vec<Binary<'a>>) -> NifResult<Term<'a>> {
    let mut texts = Vec::with_capacity(inputs.len());
    for input in &inputs {
        match as_text(input) {
            Ok(text) => texts.push(text),
            Err(e) => return Ok(to_term::<String>(env, Err(e))),
        }
    }

    let results: Vec<Term<'a>> = strategy::sanitize_batch(&texts)
        .into_iter()
        .map(|result| to_term(env, result))
        .collect();
    Ok(results.encode(env))
}

// ============================================================================
// Detection
// ============================================================================

#[rustler::nif]
fn contains_script_capable_construct<'a>(env: Env<'a>, input: Binary<'a>) -> NifResult<Term<'a>> {
    let result = as_text(&input).and_then(detect::contains_script_capable_construct);
    Ok(to_term(env, result))
}

#[rustler::nif]
fn contains_external_resource<'a>(env: Env<'a>, input: Binary<'a>) -> NifResult<Term<'a>> {
    let result = as_text(&input).and_then(detect::contains_external_resource);
    Ok(to_term(env, result))
}

#[rustler::nif]
fn contains_entity_declaration(input: Binary) -> bool {
    detect::contains_entity_declaration(&String::from_utf8_lossy(input.as_slice()))
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.RustySanitize.Native");
