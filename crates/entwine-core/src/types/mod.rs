//! # Core Type Definitions
//!
//! This module contains all core types for the entwine object graph codec:
//! - Object handles and type tags (`ObjectId`, `TypeTag`)
//! - Leaf and field values (`Scalar`, `Value`)
//! - Composite objects (`Object`, `SequenceKind`)
//! - Error types (`EntwineError`)
//!
//! ## Identity
//!
//! Composite objects live in an arena (`Heap`) and are addressed by
//! `ObjectId`. The handle IS the identity: two fields holding the same
//! `ObjectId` are aliases, two objects with equal contents are not.
//! Scalars carry no identity.

use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

// =============================================================================
// OBJECT HANDLES
// =============================================================================

/// Handle of a composite object inside a `Heap`.
///
/// Handles are dense and assigned in allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Position of this handle in its arena.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable string naming a reconstructable record type, e.g. `"wizard.Spell"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeTag(pub String);

impl TypeTag {
    /// Create a new type tag.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TypeTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SCALARS & VALUES
// =============================================================================

/// A primitive leaf. The set of primitive kinds is fixed.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Short name of the scalar kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Exact equality. Floats compare by bit pattern, so NaN matches itself
    /// and `0.0` does not match `-0.0`.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

/// The content of a field, list slot, or mapping key/value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A primitive leaf, stored inline.
    Scalar(Scalar),
    /// A reference to a composite object in the same heap.
    Ref(ObjectId),
}

impl Value {
    /// The null value.
    #[must_use]
    pub const fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    /// A text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(s.into()))
    }

    /// The referenced object, if this value is a reference.
    #[must_use]
    pub const fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(id) => Some(*id),
            Self::Scalar(_) => None,
        }
    }

    /// The text content, if this value is a text scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this value is an integer scalar.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Check if this value is null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Ref(id)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Scalar(Scalar::Int(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Scalar(Scalar::Bool(b))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Scalar(Scalar::Float(f))
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Scalar(Scalar::Bytes(bytes))
    }
}

// =============================================================================
// COMPOSITE OBJECTS
// =============================================================================

/// Flavour of an ordered sequence object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SequenceKind {
    /// Mutable ordered sequence.
    List,
    /// Fixed ordered sequence. Usable as a mapping key.
    Tuple,
    /// Unique members, kept in insertion order.
    Set,
}

impl SequenceKind {
    /// Short name of the sequence kind, for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
        }
    }
}

/// A composite object: the unit of identity in an object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Named fields under a type tag. Field order is the declared order.
    Record {
        tag: TypeTag,
        fields: Vec<(String, Value)>,
    },
    /// An ordered sequence.
    Sequence { kind: SequenceKind, items: Vec<Value> },
    /// An associative container with insertion-ordered entries.
    ///
    /// The entry list is the canonical representation; key lookup is derived
    /// from it (see `Heap::map_get`).
    Map { entries: Vec<(Value, Value)> },
}

impl Object {
    /// Short name of the object kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Record { .. } => "record",
            Self::Sequence { kind, .. } => kind.name(),
            Self::Map { .. } => "map",
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in entwine.
///
/// - No silent failures: lenient-mode fallbacks are logged, not hidden
/// - Use `Result<T, EntwineError>` for fallible operations
/// - Nothing is retried internally; inputs are deterministic
#[derive(Debug, Error)]
pub enum EntwineError {
    /// A record's type tag is not registered and strict mode is on.
    #[error("Unencodable type: `{tag}` is not registered")]
    UnencodableType { tag: TypeTag },

    /// A back-reference names an index the document never defines.
    #[error("Dangling reference: index {index} is never defined")]
    DanglingReference { index: usize },

    /// A decoded type tag is not registered and strict mode is on.
    #[error("Unknown type tag: `{tag}`")]
    UnknownTypeTag { tag: TypeTag },

    /// Traversal passed the configured depth ceiling.
    #[error("Depth exceeded: nesting is deeper than {limit}")]
    DepthExceeded { limit: usize },

    /// A decoded key cannot serve as a mapping key.
    #[error("Key reconstruction failure: {0}")]
    KeyReconstructionFailure(String),

    /// A composite mapping key met a codec with composite keys disabled.
    #[error("Composite mapping key rejected: composite key encoding is disabled")]
    CompositeKeyRejected,

    /// The document is valid JSON but breaks the wire format rules.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// The document is not valid JSON.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// The document exceeds the accepted size.
    #[error("Document size {size} bytes exceeds maximum allowed {limit} bytes")]
    DocumentTooLarge { size: usize, limit: usize },

    /// A heap handle does not name an object.
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// A heap operation does not apply to the target object.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A type tag was registered twice, or the global registry was installed twice.
    #[error("Registry conflict: {0}")]
    RegistryConflict(String),

    /// A constructor-call type rejected its decoded fields.
    #[error("Constructor for `{tag}` failed: {reason}")]
    ConstructorFailed { tag: TypeTag, reason: String },

    /// The codec options are invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_identity_is_bitwise() {
        assert!(Scalar::Float(f64::NAN).same_as(&Scalar::Float(f64::NAN)));
        assert!(!Scalar::Float(0.0).same_as(&Scalar::Float(-0.0)));
        assert!(Scalar::Float(1.5).same_as(&Scalar::Float(1.5)));
    }

    #[test]
    fn scalars_of_different_kinds_differ() {
        assert!(!Scalar::Int(1).same_as(&Scalar::Float(1.0)));
        assert!(!Scalar::Text("1".into()).same_as(&Scalar::Int(1)));
    }

    #[test]
    fn value_accessors() {
        assert_eq!(Value::from("x").as_text(), Some("x"));
        assert_eq!(Value::from(7i64).as_int(), Some(7));
        assert_eq!(Value::from(ObjectId(3)).as_object(), Some(ObjectId(3)));
        assert!(Value::null().is_null());
        assert_eq!(Value::from(true).as_object(), None);
    }

    #[test]
    fn type_tag_borrows_as_str() {
        let mut tags = std::collections::BTreeSet::new();
        tags.insert(TypeTag::new("wizard.Spell"));
        assert!(tags.contains("wizard.Spell"));
    }

    #[test]
    fn error_messages_name_the_culprit() {
        let err = EntwineError::DanglingReference { index: 9 };
        assert!(err.to_string().contains('9'));
        let err = EntwineError::UnknownTypeTag {
            tag: TypeTag::new("ghost.Type"),
        };
        assert!(err.to_string().contains("ghost.Type"));
    }
}
