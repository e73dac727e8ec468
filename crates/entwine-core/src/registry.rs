//! # Type Registry
//!
//! Maps type tags to reconstruction capabilities.
//!
//! The registry is read-only during encode/decode calls. A process-wide
//! instance can be installed once at startup with [`install_global`]; after
//! that it is never mutated, so concurrent calls read it without locking.

use crate::{EntwineError, Object, TypeTag, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Constructor applied to decoded fields.
///
/// Receives fields in document order and returns the fields of the finished
/// record, or a reason for rejecting them.
pub type ConstructFn = fn(Vec<(String, Value)>) -> Result<Vec<(String, Value)>, String>;

/// How a registered type is rebuilt during decode.
#[derive(Debug, Clone, Copy)]
pub enum Reconstruction {
    /// Allocate a skeleton with declared fields set to null, register it,
    /// then populate. Back-references to the object resolve immediately.
    Allocate,
    /// Decode all fields first, then call the constructor. The object does
    /// not exist until the constructor returns, so references to it from
    /// inside its own fields are patched afterwards.
    Construct(ConstructFn),
}

/// Registration record for one type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    tag: TypeTag,
    fields: Vec<String>,
    key_fields: Option<Vec<String>>,
    reconstruction: Reconstruction,
}

impl TypeInfo {
    /// Describe an allocate-then-populate type with no declared fields.
    #[must_use]
    pub fn new(tag: impl Into<TypeTag>) -> Self {
        Self {
            tag: tag.into(),
            fields: Vec::new(),
            key_fields: None,
            reconstruction: Reconstruction::Allocate,
        }
    }

    /// Declare field order. Encoding emits these fields first, in this order.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declare the fields that define key equality.
    ///
    /// Without key fields, records of this type are equal as keys only to
    /// themselves (identity).
    #[must_use]
    pub fn with_key_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Rebuild instances through a constructor call.
    #[must_use]
    pub fn with_constructor(mut self, construct: ConstructFn) -> Self {
        self.reconstruction = Reconstruction::Construct(construct);
        self
    }

    #[must_use]
    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn key_fields(&self) -> Option<&[String]> {
        self.key_fields.as_deref()
    }

    #[must_use]
    pub fn reconstruction(&self) -> Reconstruction {
        self.reconstruction
    }

    /// An empty instance: declared fields, all null.
    #[must_use]
    pub fn skeleton(&self) -> Object {
        Object::Record {
            tag: self.tag.clone(),
            fields: self
                .fields
                .iter()
                .map(|name| (name.clone(), Value::null()))
                .collect(),
        }
    }
}

/// Tag → type information lookup.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<TypeTag, TypeInfo>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. A tag can be registered only once.
    pub fn register(&mut self, info: TypeInfo) -> Result<(), EntwineError> {
        if self.types.contains_key(info.tag()) {
            return Err(EntwineError::RegistryConflict(format!(
                "type `{}` is already registered",
                info.tag()
            )));
        }
        self.types.insert(info.tag.clone(), info);
        Ok(())
    }

    /// Look up a type by tag.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&TypeInfo> {
        self.types.get(tag)
    }

    /// The registered tag of an object, if it is a record of a known type.
    #[must_use]
    pub fn tag_for(&self, object: &Object) -> Option<&TypeTag> {
        match object {
            Object::Record { tag, .. } => self.get(tag.as_str()).map(TypeInfo::tag),
            Object::Sequence { .. } | Object::Map { .. } => None,
        }
    }

    /// How to rebuild instances of `tag`, if it is registered.
    #[must_use]
    pub fn reconstruct(&self, tag: &str) -> Option<Reconstruction> {
        self.get(tag).map(TypeInfo::reconstruction)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All registered types, ordered by tag.
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }
}

// =============================================================================
// PROCESS-WIDE REGISTRY
// =============================================================================

static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();

/// Install the process-wide registry used by [`crate::encode`] and
/// [`crate::decode`].
///
/// Must run before the first call that reads the global registry; any later
/// install fails with `RegistryConflict`.
pub fn install_global(registry: TypeRegistry) -> Result<(), EntwineError> {
    GLOBAL.set(registry).map_err(|_| {
        EntwineError::RegistryConflict("the global type registry is already installed".to_string())
    })
}

/// The process-wide registry. Empty if none was installed.
pub fn global() -> &'static TypeRegistry {
    GLOBAL.get_or_init(TypeRegistry::new)
}

// =============================================================================
// TESTS
// =============================================================================
