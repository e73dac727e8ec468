//! # Graph Statistics
//!
//! Counts reported by `inspect`.

use entwine_core::{Object, ObjectGraph, SequenceKind, TaggedNode, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// Shape summary of a decoded graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub objects: usize,
    pub records: usize,
    pub lists: usize,
    pub tuples: usize,
    pub sets: usize,
    pub maps: usize,
    /// Maps with at least one non-scalar key.
    pub composite_key_maps: usize,
    /// Objects reachable through more than one slot (the root counts as one).
    pub shared: usize,
    /// Record count per type tag.
    pub tags: BTreeMap<String, usize>,
}

impl GraphStats {
    /// Walk every object in the graph's heap.
    pub fn collect(graph: &ObjectGraph) -> Self {
        let heap = &graph.heap;
        let mut stats = Self {
            objects: heap.len(),
            ..Self::default()
        };
        let mut incoming = vec![0usize; heap.len()];
        let mut note = |value: &Value| {
            if let Value::Ref(id) = value
                && let Some(count) = incoming.get_mut(id.slot())
            {
                *count += 1;
            }
        };
        note(&graph.root);

        for (_, object) in heap.objects() {
            match object {
                Object::Record { tag, fields } => {
                    stats.records += 1;
                    *stats.tags.entry(tag.as_str().to_string()).or_insert(0) += 1;
                    fields.iter().for_each(|(_, value)| note(value));
                }
                Object::Sequence { kind, items } => {
                    match kind {
                        SequenceKind::List => stats.lists += 1,
                        SequenceKind::Tuple => stats.tuples += 1,
                        SequenceKind::Set => stats.sets += 1,
                    }
                    items.iter().for_each(&mut note);
                }
                Object::Map { entries } => {
                    stats.maps += 1;
                    if entries.iter().any(|(key, _)| matches!(key, Value::Ref(_))) {
                        stats.composite_key_maps += 1;
                    }
                    for (key, value) in entries {
                        note(key);
                        note(value);
                    }
                }
            }
        }

        stats.shared = incoming.iter().filter(|&&count| count > 1).count();
        stats
    }
}

/// Number of back-references in an encoded tree.
pub fn count_back_refs(root: &TaggedNode) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node {
            TaggedNode::Scalar(_) => {}
            TaggedNode::BackRef(_) => count += 1,
            TaggedNode::Sequence { items, .. } => stack.extend(items),
            TaggedNode::Mapping { entries, .. } => {
                for (key, value) in entries {
                    stack.push(key);
                    stack.push(value);
                }
            }
            TaggedNode::Typed { fields, .. } => {
                stack.extend(fields.iter().map(|(_, value)| value));
            }
        }
    }
    count
}
