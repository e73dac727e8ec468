//! # Reference Registry
//!
//! Per-call tables linking object identity to reference indices.
//!
//! Both tables are append-only for the duration of one call and are
//! discarded when it ends. The index space is dense, zero-based and
//! increasing in first-discovery order.

use crate::{EntwineError, ObjectId};

// =============================================================================
// ENCODE SIDE
// =============================================================================

/// Identity → reference index.
///
/// Heap handles are dense, so this is a direct table indexed by `ObjectId`.
#[derive(Debug, Default)]
pub struct EncodeRefs {
    /// slot = ObjectId, value = assigned index
    indices: Vec<Option<usize>>,
    /// Number of indices handed out
    assigned: usize,
}

impl EncodeRefs {
    /// Create a table able to track a heap of `objects` objects.
    #[must_use]
    pub fn with_capacity(objects: usize) -> Self {
        Self {
            indices: vec![None; objects],
            assigned: 0,
        }
    }

    /// The index already assigned to `id`, if any.
    #[must_use]
    pub fn lookup(&self, id: ObjectId) -> Option<usize> {
        self.indices.get(id.slot()).copied().flatten()
    }

    /// Assign the next free index to `id`.
    ///
    /// Registering the same identity twice returns the existing index.
    pub fn register(&mut self, id: ObjectId) -> usize {
        if let Some(index) = self.lookup(id) {
            return index;
        }
        if id.slot() >= self.indices.len() {
            self.indices.resize(id.slot() + 1, None);
        }
        let index = self.assigned;
        self.indices[id.slot()] = Some(index);
        self.assigned += 1;
        index
    }

    /// Number of indices handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }
}

// =============================================================================
// DECODE SIDE
// =============================================================================

/// State of one reference index during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSlot {
    /// Index seen, object not built yet (constructor-call types).
    Reserved,
    /// Object exists on the output heap.
    Ready(ObjectId),
}

/// Reference index → materialized object.
#[derive(Debug, Default)]
pub struct DecodeRefs {
    slots: Vec<RefSlot>,
}

impl DecodeRefs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `index`. Indices must be claimed in order.
    pub fn reserve(&mut self, index: usize) -> Result<(), EntwineError> {
        if index != self.slots.len() {
            return Err(EntwineError::MalformedDocument(format!(
                "reference index {index} declared out of order (expected {})",
                self.slots.len()
            )));
        }
        self.slots.push(RefSlot::Reserved);
        Ok(())
    }

    /// Bind a reserved index to its object.
    pub fn materialize(&mut self, index: usize, id: ObjectId) -> Result<(), EntwineError> {
        match self.slots.get_mut(index) {
            Some(slot @ RefSlot::Reserved) => {
                *slot = RefSlot::Ready(id);
                Ok(())
            }
            Some(RefSlot::Ready(_)) => Err(EntwineError::MalformedDocument(format!(
                "reference index {index} declared twice"
            ))),
            None => Err(EntwineError::DanglingReference { index }),
        }
    }

    /// The slot for `index`, if it has been claimed.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<RefSlot> {
        self.slots.get(index).copied()
    }

    /// The object for `index`, if it is ready.
    #[must_use]
    pub fn ready(&self, index: usize) -> Option<ObjectId> {
        match self.get(index)? {
            RefSlot::Ready(id) => Some(id),
            RefSlot::Reserved => None,
        }
    }

    /// Number of claimed indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
