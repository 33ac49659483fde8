//! Sanitization Strategy Module
//!
//! Ways of running the sanitizer beyond a single in-memory call:
//! - Parallel: independent documents across the Rayon pool
//!
//! Stream-to-stream sanitization lives in `crate::stream`.

pub mod parallel;

pub use parallel::{sanitize_batch, sanitize_batch_with, sanitize_css_batch};
