//! # Encoder
//!
//! Depth-first graph walker producing a tagged tree.
//!
//! Every composite object is registered in the reference table BEFORE its
//! children are visited. A second visit, whether through a cycle or an alias,
//! therefore finds the index and emits a back-reference instead of
//! descending again.
//!
//! ## Visit Order
//!
//! - records: declared fields, then the rest in insertion order
//!   (or sorted by name under `deterministic_order`)
//! - sequences: item order
//! - mappings: entry order, key before value

use crate::heap::Heap;
use crate::keys;
use crate::options::Options;
use crate::refs::EncodeRefs;
use crate::registry::{TypeInfo, TypeRegistry};
use crate::tree::{MapForm, TaggedNode};
use crate::wire;
use crate::{EntwineError, Object, ObjectId, Scalar, SequenceKind, TypeTag, Value};

/// Object graph → tagged tree / text.
pub struct Encoder<'a> {
    registry: &'a TypeRegistry,
    options: &'a Options,
}

impl<'a> Encoder<'a> {
    #[must_use]
    pub fn new(registry: &'a TypeRegistry, options: &'a Options) -> Self {
        Self { registry, options }
    }

    /// Encode the graph reachable from `root` as text.
    pub fn encode(&self, heap: &Heap, root: &Value) -> Result<String, EntwineError> {
        let tree = self.encode_tree(heap, root)?;
        wire::render(&tree, self.options.indent)
    }

    /// Encode the graph reachable from `root` as a tagged tree.
    pub fn encode_tree(&self, heap: &Heap, root: &Value) -> Result<TaggedNode, EntwineError> {
        self.options.validate()?;

        let mut walk = Walk {
            heap,
            registry: self.registry,
            options: self.options,
            refs: EncodeRefs::with_capacity(heap.len()),
            on_stack: vec![false; heap.len()],
            visited: 0,
        };
        let tree = walk.value(root, 0)?;

        tracing::debug!(
            objects = walk.visited,
            indices = walk.refs.len(),
            "encoded object graph"
        );
        Ok(tree)
    }
}

/// State of one encode call.
struct Walk<'a> {
    heap: &'a Heap,
    registry: &'a TypeRegistry,
    options: &'a Options,
    refs: EncodeRefs,
    /// Objects on the current path, for cycle breaking without references.
    on_stack: Vec<bool>,
    visited: usize,
}

impl Walk<'_> {
    /// `depth` is the number of composites enclosing `value`.
    fn value(&mut self, value: &Value, depth: usize) -> Result<TaggedNode, EntwineError> {
        match value {
            Value::Scalar(scalar) => Ok(TaggedNode::Scalar(scalar.clone())),
            Value::Ref(id) => self.object(*id, depth),
        }
    }

    fn object(&mut self, id: ObjectId, depth: usize) -> Result<TaggedNode, EntwineError> {
        if self.options.make_refs {
            if let Some(index) = self.refs.lookup(id) {
                return Ok(TaggedNode::BackRef(index));
            }
        } else if self.on_stack.get(id.slot()).copied().unwrap_or(false) {
            tracing::trace!(object = %id, "cycle without references emitted as null");
            return Ok(TaggedNode::NULL);
        }

        let depth = depth + 1;
        if depth > self.options.max_depth {
            return Err(EntwineError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }

        let heap = self.heap;
        let object = heap.get(id)?;
        let index = self.options.make_refs.then(|| self.refs.register(id));
        self.visited += 1;

        self.mark(id, true);
        let node = match object {
            Object::Record { tag, fields } => self.record(index, tag, fields, depth),
            Object::Sequence { kind, items } => self.sequence(index, *kind, items, depth),
            Object::Map { entries } => self.mapping(index, entries, depth),
        };
        self.mark(id, false);
        node
    }

    fn mark(&mut self, id: ObjectId, on: bool) {
        if let Some(slot) = self.on_stack.get_mut(id.slot()) {
            *slot = on;
        }
    }

    fn record(
        &mut self,
        index: Option<usize>,
        tag: &TypeTag,
        fields: &[(String, Value)],
        depth: usize,
    ) -> Result<TaggedNode, EntwineError> {
        let registry = self.registry;
        let info = registry.get(tag.as_str());
        let typed = match info {
            Some(_) => self.options.embed_type_tags,
            None if self.options.embed_type_tags && self.options.strict_types => {
                return Err(EntwineError::UnencodableType { tag: tag.clone() });
            }
            None => {
                if self.options.embed_type_tags {
                    tracing::warn!(tag = %tag, "unregistered type encoded as a plain mapping");
                }
                false
            }
        };

        let ordered = self.field_order(fields, info);
        let mut encoded = Vec::with_capacity(ordered.len());
        for (name, value) in ordered {
            encoded.push((name.clone(), self.value(value, depth)?));
        }

        if typed {
            return Ok(TaggedNode::Typed {
                index,
                tag: tag.clone(),
                fields: encoded,
            });
        }
        Ok(TaggedNode::Mapping {
            index,
            form: MapForm::Text,
            entries: encoded
                .into_iter()
                .map(|(name, node)| (TaggedNode::Scalar(Scalar::Text(name)), node))
                .collect(),
        })
    }

    /// Declared fields first, then the rest in insertion order.
    fn field_order<'f>(
        &self,
        fields: &'f [(String, Value)],
        info: Option<&TypeInfo>,
    ) -> Vec<&'f (String, Value)> {
        let mut ordered: Vec<&(String, Value)> = Vec::with_capacity(fields.len());
        if self.options.deterministic_order {
            ordered.extend(fields);
            ordered.sort_by(|a, b| a.0.cmp(&b.0));
            return ordered;
        }
        let declared = info.map(TypeInfo::fields).unwrap_or_default();
        for name in declared {
            if let Some(field) = fields.iter().find(|(n, _)| n == name) {
                ordered.push(field);
            }
        }
        ordered.extend(fields.iter().filter(|(n, _)| !declared.contains(n)));
        ordered
    }

    /// Keys must be hashable and pairwise distinct, or the decoder would
    /// refuse or merge them.
    fn check_keys<'k>(
        &self,
        keys: impl Iterator<Item = &'k Value>,
        what: &str,
    ) -> Result<(), EntwineError> {
        let keys: Vec<&Value> = keys.collect();
        for key in &keys {
            self.heap.require_hashable(key)?;
        }
        if let Some(position) = self.heap.duplicate_key(&keys, self.registry)? {
            return Err(EntwineError::InvalidOperation(format!(
                "{what} at position {position} equals an earlier one"
            )));
        }
        Ok(())
    }

    fn sequence(
        &mut self,
        index: Option<usize>,
        kind: SequenceKind,
        items: &[Value],
        depth: usize,
    ) -> Result<TaggedNode, EntwineError> {
        if kind == SequenceKind::Set {
            self.check_keys(items.iter(), "set member")?;
        }
        let items = items
            .iter()
            .map(|item| self.value(item, depth))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaggedNode::Sequence { index, kind, items })
    }

    fn mapping(
        &mut self,
        index: Option<usize>,
        entries: &[(Value, Value)],
        depth: usize,
    ) -> Result<TaggedNode, EntwineError> {
        self.check_keys(entries.iter().map(|(key, _)| key), "mapping key")?;
        let form = keys::form_for(entries, self.options)?;
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = match form {
                MapForm::Text => TaggedNode::Scalar(Scalar::Text(keys::text_key(key)?)),
                MapForm::Entries => self.value(key, depth)?,
            };
            let value = self.value(value, depth)?;
            encoded.push((key, value));
        }
        Ok(TaggedNode::Mapping {
            index,
            form,
            entries: encoded,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(TypeInfo::new("geo.Point").with_fields(["x", "y"]))
            .expect("register");
        registry
    }

    fn encode_with(heap: &Heap, root: ObjectId, options: &Options) -> Result<String, EntwineError> {
        let registry = registry();
        Encoder::new(&registry, options).encode(heap, &Value::Ref(root))
    }

    #[test]
    fn declared_fields_come_first() {
        let mut heap = Heap::new();
        let p = heap
            .record(
                "geo.Point",
                [
                    ("label", Value::text("origin")),
                    ("y", Value::from(0i64)),
                    ("x", Value::from(0i64)),
                ],
            )
            .expect("record");

        let text = encode_with(&heap, p, &Options::default()).expect("encode");
        assert_eq!(
            text,
            r#"{"$id":0,"$type":"geo.Point","x":0,"y":0,"label":"origin"}"#
        );
    }

    #[test]
    fn deterministic_order_sorts_fields() {
        let mut heap = Heap::new();
        let p = heap
            .record(
                "geo.Point",
                [("y", Value::from(2i64)), ("label", Value::null()), ("x", Value::from(1i64))],
            )
            .expect("record");
        let options = Options {
            deterministic_order: true,
            ..Options::default()
        };
        let text = encode_with(&heap, p, &options).expect("encode");
        assert_eq!(
            text,
            r#"{"$id":0,"$type":"geo.Point","label":null,"x":1,"y":2}"#
        );
    }

    #[test]
    fn self_reference_becomes_backref() {
        let mut heap = Heap::new();
        let list = heap.list(vec![]);
        heap.push(list, Value::Ref(list)).expect("push");

        let text = encode_with(&heap, list, &Options::default()).expect("encode");
        assert_eq!(text, r#"{"$id":0,"$items":[{"$ref":0}]}"#);
    }

    #[test]
    fn without_refs_aliases_are_copied_and_cycles_nulled() {
        let mut heap = Heap::new();
        let shared = heap.tuple(vec![Value::from(1i64)]);
        let root = heap.list(vec![Value::Ref(shared), Value::Ref(shared)]);
        heap.push(root, Value::Ref(root)).expect("push");

        let options = Options {
            make_refs: false,
            ..Options::default()
        };
        let text = encode_with(&heap, root, &options).expect("encode");
        assert_eq!(
            text,
            r#"{"$items":[{"$tuple":[1]},{"$tuple":[1]},null]}"#
        );
    }

    #[test]
    fn unregistered_tag_strict_and_lenient() {
        let mut heap = Heap::new();
        let ghost = heap
            .record("ghost.Ghost", [("boo", Value::from(true))])
            .expect("record");

        assert!(matches!(
            encode_with(&heap, ghost, &Options::default()),
            Err(EntwineError::UnencodableType { .. })
        ));
        let text = encode_with(&heap, ghost, &Options::lenient()).expect("encode");
        assert_eq!(text, r#"{"$id":0,"boo":true}"#);
    }

    #[test]
    fn untagged_records_are_plain_mappings() {
        let mut heap = Heap::new();
        let p = heap
            .record("geo.Point", [("x", Value::from(1i64)), ("y", Value::from(2i64))])
            .expect("record");
        let options = Options {
            embed_type_tags: false,
            ..Options::default()
        };
        let text = encode_with(&heap, p, &options).expect("encode");
        assert_eq!(text, r#"{"$id":0,"x":1,"y":2}"#);
    }

    #[test]
    fn composite_keys_use_entries() {
        let mut heap = Heap::new();
        let key = heap.tuple(vec![Value::from(1i64), Value::from(2i64)]);
        let map = heap.map();
        heap.map_insert(map, Value::Ref(key), Value::Ref(key), &TypeRegistry::new())
            .expect("insert");

        let text = encode_with(&heap, map, &Options::default()).expect("encode");
        assert_eq!(
            text,
            r#"{"$id":0,"$entries":[[{"$id":1,"$tuple":[1,2]},{"$ref":1}]]}"#
        );
    }

    #[test]
    fn depth_ceiling_enforced() {
        let mut heap = Heap::new();
        let mut current = heap.list(vec![]);
        for _ in 0..5 {
            current = heap.list(vec![Value::Ref(current)]);
        }
        let shallow = Options {
            max_depth: 5,
            ..Options::default()
        };
        assert!(matches!(
            encode_with(&heap, current, &shallow),
            Err(EntwineError::DepthExceeded { limit: 5 })
        ));
        let enough = Options {
            max_depth: 6,
            ..Options::default()
        };
        assert!(encode_with(&heap, current, &enough).is_ok());
    }

    #[test]
    fn unhashable_allocated_key_rejected() {
        let mut heap = Heap::new();
        let list = heap.list(vec![]);
        let map = heap
            .alloc(Object::Map {
                entries: vec![(Value::Ref(list), Value::from(1i64))],
            })
            .expect("alloc");
        assert!(matches!(
            encode_with(&heap, map, &Options::default()),
            Err(EntwineError::InvalidOperation(_))
        ));
    }

    #[test]
    fn duplicate_allocated_keys_rejected() {
        let mut heap = Heap::new();
        let map = heap
            .alloc(Object::Map {
                entries: vec![
                    (Value::from(1i64), Value::text("a")),
                    (Value::from(1i64), Value::text("b")),
                ],
            })
            .expect("alloc");
        assert!(matches!(
            encode_with(&heap, map, &Options::default()),
            Err(EntwineError::InvalidOperation(_))
        ));

        let first = heap.tuple(vec![Value::from(1i64)]);
        let second = heap.tuple(vec![Value::from(1i64)]);
        let set = heap
            .alloc(Object::Sequence {
                kind: SequenceKind::Set,
                items: vec![Value::Ref(first), Value::Ref(second)],
            })
            .expect("alloc");
        assert!(matches!(
            encode_with(&heap, set, &Options::default()),
            Err(EntwineError::InvalidOperation(_))
        ));
    }

    #[test]
    fn scalar_root_encodes_directly() {
        let registry = TypeRegistry::new();
        let options = Options::default();
        let text = Encoder::new(&registry, &options)
            .encode(&Heap::new(), &Value::from(42i64))
            .expect("encode");
        assert_eq!(text, "42");
    }
}
