//! # Wire Primitives
//!
//! Reserved markers and hard limits for the entwine wire format.
//!
//! These are compiled into the binary and are immutable at runtime.
//!
//! ## Reserved Markers
//!
//! Every reserved key begins with [`RESERVED_PREFIX`]. Ordinary data never
//! uses a key with that prefix: record field names with it are rejected by the
//! heap, and mapping keys with it force the entry-list form.

/// First character of every reserved side-channel key.
pub const RESERVED_PREFIX: char = '$';

/// Reference index of a composite node, present on its first occurrence only.
pub const ID_KEY: &str = "$id";

/// Back-reference to an earlier node. The only key of its JSON object.
pub const REF_KEY: &str = "$ref";

/// Type tag of a reconstructable record.
pub const TYPE_KEY: &str = "$type";

/// Mapping in entry-list form: `[[key, value], ...]`.
pub const ENTRIES_KEY: &str = "$entries";

/// Element array of a list object.
pub const ITEMS_KEY: &str = "$items";

/// Element array of a tuple object.
pub const TUPLE_KEY: &str = "$tuple";

/// Member array of a set object.
pub const SET_KEY: &str = "$set";

/// Base64 payload of a byte-sequence scalar.
pub const BYTES_KEY: &str = "$bytes";

/// Non-finite float: `"nan"`, `"inf"` or `"-inf"`.
pub const FLOAT_KEY: &str = "$float";

/// Default recursion ceiling for encode and decode.
///
/// Counts composite nesting: a record inside a list inside a map is depth 3.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// JSON bracket levels a single composite may open.
///
/// A map in entry-list form is the widest case:
/// `{"$entries": [[key, value]]}` opens three levels before its children.
pub const JSON_LEVELS_PER_DEPTH: usize = 3;

/// Maximum document size accepted by the decoder (256 MB).
///
/// Validated BEFORE the document is parsed.
pub const MAX_DOCUMENT_BYTES: usize = 256 * 1024 * 1024;

/// Widest pretty-print indentation accepted by `Options::validate`.
pub const MAX_INDENT: usize = 16;

/// Check whether a key would collide with the reserved marker namespace.
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_marker_is_reserved() {
        for marker in [
            ID_KEY,
            REF_KEY,
            TYPE_KEY,
            ENTRIES_KEY,
            ITEMS_KEY,
            TUPLE_KEY,
            SET_KEY,
            BYTES_KEY,
            FLOAT_KEY,
        ] {
            assert!(is_reserved(marker), "{marker} must carry the prefix");
        }
    }

    #[test]
    fn plain_keys_are_not_reserved() {
        assert!(!is_reserved("name"));
        assert!(!is_reserved(""));
        assert!(!is_reserved("price$"));
    }
}
