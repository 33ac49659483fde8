//! Error Types
//!
//! Markup sanitization is fatal on error; CSS sanitization maps every
//! error to an empty result at its public boundary.

use crate::core::tokenizer::ParseError;
use thiserror::Error;

/// Errors raised by the sanitizer
#[derive(Error, Debug)]
pub enum SanitizeError {
    /// Malformed markup or stylesheet input
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Media rules (or functions) nested deeper than allowed
    #[error("Nesting limit of {limit} exceeded")]
    NestingLimitExceeded { limit: usize },

    /// Source or sink failure in the streaming variants
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid option values
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl SanitizeError {
    /// Convert into an `io::Error` for delivery through a `Read` stream.
    /// I/O errors pass through with their original kind.
    pub fn into_io_error(self) -> std::io::Error {
        match self {
            SanitizeError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SanitizeError>;
