//! Parallel Batch Sanitization
//!
//! Uses Rayon to sanitize independent documents concurrently. Each document
//! gets its own filter state; only the read-only tables are shared.

use crate::css::{sanitize_css, SanitizationOptions};
use crate::error::Result;
use crate::SvgSanitizer;
use rayon::prelude::*;

/// Sanitize many documents with default options, results in input order
pub fn sanitize_batch(docs: &[&str]) -> Vec<Result<String>> {
    sanitize_batch_with(&SvgSanitizer::default(), docs)
}

/// Sanitize many documents with one sanitizer configuration
pub fn sanitize_batch_with(sanitizer: &SvgSanitizer, docs: &[&str]) -> Vec<Result<String>> {
    docs.par_iter().map(|doc| sanitizer.sanitize_str(doc)).collect()
}

/// Sanitize many stylesheets
pub fn sanitize_css_batch(sheets: &[&str], options: &SanitizationOptions) -> Vec<String> {
    sheets.par_iter().map(|css| sanitize_css(css, options)).collect()
}
