//! # Codec Options
//!
//! Per-call configuration for encode and decode.
//!
//! Every field has a default, so a partial TOML table (or none at all) is a
//! valid configuration.

use crate::EntwineError;
use crate::primitives::{DEFAULT_MAX_DEPTH, MAX_INDENT};
use serde::{Deserialize, Serialize};

/// Codec configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Emit the type tags needed to rebuild records.
    pub embed_type_tags: bool,
    /// Encode non-text mapping keys in entry-list form. When off, scalar keys
    /// are stringified and composite keys are rejected.
    pub encode_composite_keys: bool,
    /// Recursion ceiling, in composite nesting levels.
    pub max_depth: usize,
    /// Fail on unregistered tags instead of falling back to structure.
    pub strict_types: bool,
    /// Emit record fields sorted by name.
    pub deterministic_order: bool,
    /// Emit reference indices and back-references.
    pub make_refs: bool,
    /// Pretty-print with this indentation width.
    pub indent: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            embed_type_tags: true,
            encode_composite_keys: true,
            max_depth: DEFAULT_MAX_DEPTH,
            strict_types: true,
            deterministic_order: false,
            make_refs: true,
            indent: None,
        }
    }
}

impl Options {
    /// Lenient defaults: unknown tags fall back instead of failing.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict_types: false,
            ..Self::default()
        }
    }

    /// Check the options before use.
    pub fn validate(&self) -> Result<(), EntwineError> {
        if self.max_depth == 0 {
            return Err(EntwineError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if let Some(indent) = self.indent
            && indent > MAX_INDENT
        {
            return Err(EntwineError::InvalidConfig(format!(
                "indent {indent} exceeds maximum {MAX_INDENT}"
            )));
        }
        Ok(())
    }
}
