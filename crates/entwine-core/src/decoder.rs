//! # Decoder
//!
//! Rebuilds an object graph from a tagged tree.
//!
//! ## Two Phases, Interleaved
//!
//! 1. Skeleton first: an allocate-then-populate record (and every container)
//!    is allocated and bound to its reference index BEFORE any child is
//!    decoded, so back-references from inside resolve to it immediately.
//! 2. Populate: children are decoded depth-first. A back-reference to an
//!    index that is not bound yet leaves a null placeholder and a pending
//!    patch, applied as soon as the referent materializes.
//!
//! Constructor-call records are the source of pending patches: the instance
//! only exists once the constructor has seen every decoded field.

use crate::heap::{Heap, ObjectGraph};
use crate::keys;
use crate::options::Options;
use crate::refs::DecodeRefs;
use crate::registry::{ConstructFn, Reconstruction, TypeRegistry};
use crate::tree::{Document, MapForm, TaggedNode};
use crate::wire;
use crate::{EntwineError, Object, ObjectId, SequenceKind, TypeTag, Value};
use std::collections::BTreeSet;

/// Text / tagged tree → object graph.
pub struct Decoder<'a> {
    registry: &'a TypeRegistry,
    options: &'a Options,
}

impl<'a> Decoder<'a> {
    #[must_use]
    pub fn new(registry: &'a TypeRegistry, options: &'a Options) -> Self {
        Self { registry, options }
    }

    /// Decode text into a new object graph.
    pub fn decode(&self, text: &str) -> Result<ObjectGraph, EntwineError> {
        self.options.validate()?;
        let document = wire::parse(text, self.options.max_depth)?;
        self.decode_document(document)
    }

    /// Decode an already-parsed document.
    pub fn decode_document(&self, document: Document) -> Result<ObjectGraph, EntwineError> {
        self.options.validate()?;

        let mut build = Build {
            registry: self.registry,
            options: self.options,
            heap: Heap::new(),
            refs: DecodeRefs::new(),
            declared: document.declared,
            patches: Vec::new(),
            patched: 0,
            unsettled: BTreeSet::new(),
            recheck: BTreeSet::new(),
        };
        let root = match build.node(document.root, 0)? {
            Decoded::Ready(value) => value,
            Decoded::Pending(index) => return Err(EntwineError::DanglingReference { index }),
        };
        build.finish()?;

        tracing::debug!(
            objects = build.heap.len(),
            indices = build.refs.len(),
            patched = build.patched,
            "decoded object graph"
        );
        Ok(ObjectGraph::new(build.heap, root))
    }
}

// =============================================================================
// BUILD STATE
// =============================================================================

/// Result of decoding one node.
enum Decoded {
    Ready(Value),
    /// A back-reference to an index whose object does not exist yet.
    Pending(usize),
}

/// Where a pending reference must be written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Field(String),
    Item(usize),
    EntryValue(usize),
}

/// "Once index `referent` exists, write it into `slot` of `owner`."
#[derive(Debug)]
struct PendingPatch {
    referent: usize,
    owner: ObjectId,
    slot: Slot,
}

/// State of one decode call.
struct Build<'a> {
    registry: &'a TypeRegistry,
    options: &'a Options,
    heap: Heap,
    refs: DecodeRefs,
    /// Number of indices the document declares.
    declared: usize,
    patches: Vec<PendingPatch>,
    patched: usize,
    /// Records whose fields are still being decoded.
    unsettled: BTreeSet<ObjectId>,
    /// Maps and sets that took a key reaching an unsettled record.
    recheck: BTreeSet<ObjectId>,
}

impl Build<'_> {
    /// `depth` is the number of composites enclosing `node`.
    fn node(&mut self, node: TaggedNode, depth: usize) -> Result<Decoded, EntwineError> {
        let depth = match node {
            TaggedNode::Scalar(scalar) => return Ok(Decoded::Ready(Value::Scalar(scalar))),
            TaggedNode::BackRef(index) => return self.back_ref(index),
            _ => depth + 1,
        };
        if depth > self.options.max_depth {
            return Err(EntwineError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }

        let id = match node {
            TaggedNode::Sequence { index, kind, items } => {
                self.sequence(index, kind, items, depth)?
            }
            TaggedNode::Mapping {
                index,
                form,
                entries,
            } => self.mapping(index, form, entries, depth)?,
            TaggedNode::Typed { index, tag, fields } => self.typed(index, tag, fields, depth)?,
            TaggedNode::Scalar(_) | TaggedNode::BackRef(_) => {
                return Err(EntwineError::InvalidOperation(
                    "leaf node reached composite decoding".to_string(),
                ));
            }
        };
        Ok(Decoded::Ready(Value::Ref(id)))
    }

    fn back_ref(&self, index: usize) -> Result<Decoded, EntwineError> {
        if index >= self.declared {
            return Err(EntwineError::DanglingReference { index });
        }
        Ok(match self.refs.ready(index) {
            Some(id) => Decoded::Ready(Value::Ref(id)),
            None => Decoded::Pending(index),
        })
    }

    /// Bind a freshly allocated object to its index, then settle any patch
    /// that was waiting for it.
    fn bind(&mut self, index: Option<usize>, id: ObjectId) -> Result<(), EntwineError> {
        if let Some(index) = index {
            self.refs.reserve(index)?;
            self.refs.materialize(index, id)?;
            self.sweep()?;
        }
        Ok(())
    }

    /// Turn a decoded child into the value to store, recording a patch if
    /// the child is still pending.
    fn place(&mut self, decoded: Decoded, owner: ObjectId, slot: Slot) -> Value {
        match decoded {
            Decoded::Ready(value) => value,
            Decoded::Pending(referent) => {
                self.patches.push(PendingPatch {
                    referent,
                    owner,
                    slot,
                });
                Value::null()
            }
        }
    }

    /// Apply every patch whose referent now exists.
    fn sweep(&mut self) -> Result<(), EntwineError> {
        if self.patches.is_empty() {
            return Ok(());
        }
        let refs = &self.refs;
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.patches)
            .into_iter()
            .partition(|patch| refs.ready(patch.referent).is_some());
        self.patches = waiting;

        for patch in ready {
            let Some(target) = self.refs.ready(patch.referent) else {
                continue;
            };
            let value = Value::Ref(target);
            match patch.slot {
                Slot::Field(name) => self.heap.set_field(patch.owner, &name, value)?,
                Slot::Item(position) => self.heap.set_item(patch.owner, position, value)?,
                Slot::EntryValue(position) => {
                    self.heap.replace_entry_value(patch.owner, position, value)?;
                }
            }
            self.patched += 1;
        }
        Ok(())
    }

    /// Fail on leftover patches, then fold keys that only became equal once
    /// their records settled (last write wins, as during decode).
    fn finish(&mut self) -> Result<(), EntwineError> {
        if let Some(patch) = self.patches.first() {
            return Err(EntwineError::DanglingReference {
                index: patch.referent,
            });
        }
        for id in std::mem::take(&mut self.recheck) {
            let removed = self.heap.collapse_duplicate_keys(id, self.registry)?;
            if removed > 0 {
                tracing::debug!(object = %id, removed, "merged keys equal after decode");
            }
        }
        Ok(())
    }

    // =========================================================================
    // CONTAINERS
    // =========================================================================

    fn sequence(
        &mut self,
        index: Option<usize>,
        kind: SequenceKind,
        items: Vec<TaggedNode>,
        depth: usize,
    ) -> Result<ObjectId, EntwineError> {
        let id = match kind {
            SequenceKind::List => self.heap.list(Vec::with_capacity(items.len())),
            SequenceKind::Tuple => self.heap.tuple(Vec::with_capacity(items.len())),
            SequenceKind::Set => self.heap.set(),
        };
        self.bind(index, id)?;

        for (position, item) in items.into_iter().enumerate() {
            let decoded = self.node(item, depth)?;
            if kind == SequenceKind::Set {
                let member = self.key(decoded)?;
                if self.reaches_unsettled(&member)? {
                    self.recheck.insert(id);
                }
                self.heap
                    .set_insert_within(id, member, self.registry, &self.unsettled)?;
            } else {
                let value = self.place(decoded, id, Slot::Item(position));
                self.heap.push(id, value)?;
            }
        }
        Ok(id)
    }

    fn mapping(
        &mut self,
        index: Option<usize>,
        form: MapForm,
        entries: Vec<(TaggedNode, TaggedNode)>,
        depth: usize,
    ) -> Result<ObjectId, EntwineError> {
        let id = self.heap.map();
        self.bind(index, id)?;

        for (key, value) in entries {
            let key = match form {
                MapForm::Text => match key {
                    TaggedNode::Scalar(scalar) => Value::Scalar(scalar),
                    _ => {
                        return Err(EntwineError::MalformedDocument(
                            "text-form mapping key is not a scalar".to_string(),
                        ));
                    }
                },
                MapForm::Entries => {
                    let decoded = self.node(key, depth)?;
                    self.key(decoded)?
                }
            };
            let value = self.node(value, depth)?;

            // Last write wins: keep the first key and its position.
            let existing = match form {
                MapForm::Text => None,
                MapForm::Entries => {
                    if self.reaches_unsettled(&key)? {
                        self.recheck.insert(id);
                    }
                    self.heap
                        .find_entry_within(id, &key, self.registry, &self.unsettled)?
                }
            };
            match existing {
                Some(position) => {
                    self.patches
                        .retain(|p| !(p.owner == id && p.slot == Slot::EntryValue(position)));
                    let value = self.place(value, id, Slot::EntryValue(position));
                    self.heap.replace_entry_value(id, position, value)?;
                }
                None => {
                    let position = self.heap.entries(id)?.len();
                    let value = self.place(value, id, Slot::EntryValue(position));
                    self.heap.push_entry(id, key, value)?;
                }
            }
        }
        Ok(id)
    }

    /// Admit a decoded key or set member.
    fn key(&self, decoded: Decoded) -> Result<Value, EntwineError> {
        let key = match decoded {
            Decoded::Ready(value) => value,
            Decoded::Pending(index) => {
                return Err(EntwineError::KeyReconstructionFailure(format!(
                    "key refers to index {index}, which is not built yet"
                )));
            }
        };
        keys::admit(&self.heap, &key)?;
        if self.awaits_patch(&key)? {
            return Err(EntwineError::KeyReconstructionFailure(
                "key contains a reference that is not built yet".to_string(),
            ));
        }
        Ok(key)
    }

    /// Check whether any object reachable from `value` still has a pending
    /// patch.
    fn awaits_patch(&self, value: &Value) -> Result<bool, EntwineError> {
        if self.patches.is_empty() {
            return Ok(false);
        }
        let owners: BTreeSet<ObjectId> = self.patches.iter().map(|p| p.owner).collect();
        let mut seen = BTreeSet::new();
        let mut pending = vec![value.clone()];
        while let Some(current) = pending.pop() {
            let Value::Ref(id) = current else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            if owners.contains(&id) {
                return Ok(true);
            }
            match self.heap.get(id)? {
                Object::Record { fields, .. } => {
                    pending.extend(fields.iter().map(|(_, v)| v.clone()));
                }
                Object::Sequence { items, .. } => pending.extend(items.iter().cloned()),
                Object::Map { entries } => {
                    for (k, v) in entries {
                        pending.push(k.clone());
                        pending.push(v.clone());
                    }
                }
            }
        }
        Ok(false)
    }

    /// Check whether a key reaches a record that is still being populated.
    fn reaches_unsettled(&self, key: &Value) -> Result<bool, EntwineError> {
        if self.unsettled.is_empty() {
            return Ok(false);
        }
        let mut seen = BTreeSet::new();
        let mut pending = vec![key];
        while let Some(current) = pending.pop() {
            let Value::Ref(id) = current else {
                continue;
            };
            if !seen.insert(*id) {
                continue;
            }
            if self.unsettled.contains(id) {
                return Ok(true);
            }
            match self.heap.get(*id)? {
                Object::Record { fields, .. } => pending.extend(fields.iter().map(|(_, v)| v)),
                Object::Sequence {
                    kind: SequenceKind::Tuple,
                    items,
                } => pending.extend(items),
                Object::Sequence { .. } | Object::Map { .. } => {}
            }
        }
        Ok(false)
    }

    // =========================================================================
    // RECORDS
    // =========================================================================

    fn typed(
        &mut self,
        index: Option<usize>,
        tag: TypeTag,
        fields: Vec<(String, TaggedNode)>,
        depth: usize,
    ) -> Result<ObjectId, EntwineError> {
        let registry = self.registry;
        match registry.get(tag.as_str()) {
            Some(info) => match info.reconstruction() {
                Reconstruction::Allocate => {
                    let id = self.heap.alloc(info.skeleton())?;
                    self.populate(index, id, fields, depth)
                }
                Reconstruction::Construct(construct) => {
                    self.construct(index, tag, construct, fields, depth)
                }
            },
            None if self.options.strict_types => Err(EntwineError::UnknownTypeTag { tag }),
            None => {
                tracing::warn!(tag = %tag, "unknown type tag decoded as a generic record");
                let id = self.heap.record(tag, Vec::<(String, Value)>::new())?;
                self.populate(index, id, fields, depth)
            }
        }
    }

    /// Allocate-then-populate.
    fn populate(
        &mut self,
        index: Option<usize>,
        id: ObjectId,
        fields: Vec<(String, TaggedNode)>,
        depth: usize,
    ) -> Result<ObjectId, EntwineError> {
        self.bind(index, id)?;
        self.unsettled.insert(id);
        for (name, node) in fields {
            let decoded = self.node(node, depth)?;
            let value = self.place(decoded, id, Slot::Field(name.clone()));
            self.heap.set_field(id, &name, value)?;
        }
        self.unsettled.remove(&id);
        Ok(id)
    }

    /// Decode every field, then call the constructor.
    fn construct(
        &mut self,
        index: Option<usize>,
        tag: TypeTag,
        construct: ConstructFn,
        fields: Vec<(String, TaggedNode)>,
        depth: usize,
    ) -> Result<ObjectId, EntwineError> {
        if let Some(index) = index {
            self.refs.reserve(index)?;
        }

        let mut decoded = Vec::with_capacity(fields.len());
        let mut deferred = Vec::new();
        for (name, node) in fields {
            match self.node(node, depth)? {
                Decoded::Ready(value) => decoded.push((name, value)),
                Decoded::Pending(referent) => {
                    deferred.push((referent, name.clone()));
                    decoded.push((name, Value::null()));
                }
            }
        }

        let built = construct(decoded).map_err(|reason| EntwineError::ConstructorFailed {
            tag: tag.clone(),
            reason,
        })?;
        // a field the constructor dropped has nowhere to be patched
        deferred.retain(|(_, name)| built.iter().any(|(kept, _)| kept == name));
        let id = self.heap.record(tag, built)?;

        for (referent, name) in deferred {
            self.patches.push(PendingPatch {
                referent,
                owner: id,
                slot: Slot::Field(name),
            });
        }
        if let Some(index) = index {
            self.refs.materialize(index, id)?;
        }
        self.sweep()?;
        Ok(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
