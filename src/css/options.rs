//! CSS sanitization options

use crate::error::{Result, SanitizeError};

/// Hard ceiling for `max_nesting_depth`
pub const MAX_NESTING_CEILING: usize = 256;

/// Options for CSS sanitization. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationOptions {
    allow_uris: bool,
    strict_property_whitelist: bool,
    max_css_length: usize,
    max_nesting_depth: usize,
}

impl Default for SanitizationOptions {
    fn default() -> Self {
        SanitizationOptions {
            allow_uris: false,
            strict_property_whitelist: false,
            max_css_length: 100_000,
            max_nesting_depth: 10,
        }
    }
}

impl SanitizationOptions {
    pub fn builder() -> SanitizationOptionsBuilder {
        SanitizationOptionsBuilder::default()
    }

    /// Keep vetted `url()` values instead of neutralizing every one
    pub fn allow_uris(&self) -> bool {
        self.allow_uris
    }

    /// Restrict declarations to the safe property set
    pub fn strict_property_whitelist(&self) -> bool {
        self.strict_property_whitelist
    }

    /// Stylesheet text beyond this many bytes is truncated before parsing
    pub fn max_css_length(&self) -> usize {
        self.max_css_length
    }

    /// Deepest allowed `@media` nesting
    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }
}

/// Builder for [`SanitizationOptions`]
#[derive(Debug, Clone, Default)]
pub struct SanitizationOptionsBuilder {
    options: SanitizationOptions,
}

impl SanitizationOptionsBuilder {
    pub fn allow_uris(mut self, allow: bool) -> Self {
        self.options.allow_uris = allow;
        self
    }

    pub fn strict_property_whitelist(mut self, strict: bool) -> Self {
        self.options.strict_property_whitelist = strict;
        self
    }

    pub fn max_css_length(mut self, length: usize) -> Self {
        self.options.max_css_length = length;
        self
    }

    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.options.max_nesting_depth = depth;
        self
    }

    /// Validate and build the options
    pub fn build(self) -> Result<SanitizationOptions> {
        let options = self.options;
        if options.max_css_length == 0 {
            return Err(SanitizeError::Configuration(
                "max_css_length must be greater than zero".to_string(),
            ));
        }
        if options.max_nesting_depth == 0 {
            return Err(SanitizeError::Configuration(
                "max_nesting_depth must be greater than zero".to_string(),
            ));
        }
        if options.max_nesting_depth > MAX_NESTING_CEILING {
            return Err(SanitizeError::Configuration(format!(
                "max_nesting_depth must not exceed {}",
                MAX_NESTING_CEILING
            )));
        }
        Ok(options)
    }
}
