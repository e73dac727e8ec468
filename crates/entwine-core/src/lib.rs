//! # entwine-core
//!
//! Reference-preserving serialization of object graphs.
//!
//! This crate turns an in-memory object graph into JSON text and back while
//! keeping identity intact:
//! - cycles terminate through back-references
//! - aliased sub-objects decode to one shared instance
//! - mappings may be keyed by composite objects, including objects that also
//!   appear elsewhere in the graph
//!
//! ## Pipeline
//!
//! ```text
//! Heap ──Encoder──▶ TaggedNode ──wire──▶ JSON text
//! JSON text ──wire──▶ TaggedNode ──Decoder──▶ Heap
//! ```
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no I/O, no async
//! - Per-call state only: reference tables and pending patches live for one
//!   call; the type registry is the only shared structure and it is
//!   read-only once installed
//! - Deterministic: the same graph always encodes to the same text
//! - Bounded: every traversal carries an explicit depth ceiling

// =============================================================================
// MODULES
// =============================================================================

pub mod decoder;
pub mod encoder;
pub mod heap;
pub mod keys;
pub mod options;
pub mod primitives;
pub mod refs;
pub mod registry;
pub mod tree;
pub mod types;
pub mod wire;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EntwineError, Object, ObjectId, Scalar, SequenceKind, TypeTag, Value};

// =============================================================================
// RE-EXPORTS: Codec
// =============================================================================

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use heap::{Heap, ObjectGraph, isomorphic};
pub use options::Options;
pub use registry::{ConstructFn, Reconstruction, TypeInfo, TypeRegistry, install_global};
pub use tree::{Document, MapForm, TaggedNode};

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Encode the graph reachable from `root` with the process-wide registry.
pub fn encode(heap: &Heap, root: &Value, options: &Options) -> Result<String, EntwineError> {
    Encoder::new(registry::global(), options).encode(heap, root)
}

/// Decode text into a new graph with the process-wide registry.
pub fn decode(text: &str, options: &Options) -> Result<ObjectGraph, EntwineError> {
    Decoder::new(registry::global(), options).decode(text)
}
