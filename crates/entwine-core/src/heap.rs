//! # Object Heap
//!
//! The arena that holds an object graph.
//!
//! Composite objects are stored in a `Vec` and addressed by dense `ObjectId`
//! handles. Fields hold `Value`s, which are either inline scalars or handles,
//! so cycles and shared sub-objects are plain index loops.
//!
//! The heap is also the field-introspection capability the codec relies on:
//! `fields(id)` lists a record's `(name, value)` pairs in order, and the
//! `TypeRegistry` provides the inverse (tag + fields → instance).

use crate::primitives::is_reserved;
use crate::registry::TypeRegistry;
use crate::{EntwineError, Object, ObjectId, SequenceKind, TypeTag, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// HEAP
// =============================================================================

/// The arena of composite objects.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    /// Object storage: slot = ObjectId
    objects: Vec<Object>,
}

impl Heap {
    /// Create a new empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in allocation order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(slot, object)| (ObjectId(slot as u64), object))
    }

    /// Allocate an object and return its handle.
    ///
    /// Record field names must not use the reserved marker prefix.
    pub fn alloc(&mut self, object: Object) -> Result<ObjectId, EntwineError> {
        if let Object::Record { fields, .. } = &object {
            for (name, _) in fields {
                check_field_name(name)?;
            }
        }
        let id = ObjectId(self.objects.len() as u64);
        self.objects.push(object);
        Ok(id)
    }

    /// Allocate a record.
    pub fn record<I, S>(&mut self, tag: impl Into<TypeTag>, fields: I) -> Result<ObjectId, EntwineError>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.alloc(Object::Record {
            tag: tag.into(),
            fields: fields.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        })
    }

    /// Allocate a list.
    pub fn list(&mut self, items: Vec<Value>) -> ObjectId {
        self.push_object(Object::Sequence {
            kind: SequenceKind::List,
            items,
        })
    }

    /// Allocate a tuple.
    pub fn tuple(&mut self, items: Vec<Value>) -> ObjectId {
        self.push_object(Object::Sequence {
            kind: SequenceKind::Tuple,
            items,
        })
    }

    /// Allocate an empty set. Members are added with `set_insert`.
    pub fn set(&mut self) -> ObjectId {
        self.push_object(Object::Sequence {
            kind: SequenceKind::Set,
            items: Vec::new(),
        })
    }

    /// Allocate an empty map. Entries are added with `map_insert`.
    pub fn map(&mut self) -> ObjectId {
        self.push_object(Object::Map {
            entries: Vec::new(),
        })
    }

    /// Allocation for objects that cannot carry field names.
    fn push_object(&mut self, object: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u64);
        self.objects.push(object);
        id
    }

    /// Lookup an object by handle.
    pub fn get(&self, id: ObjectId) -> Result<&Object, EntwineError> {
        self.objects
            .get(id.slot())
            .ok_or(EntwineError::ObjectNotFound(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut Object, EntwineError> {
        self.objects
            .get_mut(id.slot())
            .ok_or(EntwineError::ObjectNotFound(id))
    }

    // =========================================================================
    // RECORDS
    // =========================================================================

    /// The type tag of a record.
    pub fn tag(&self, id: ObjectId) -> Result<&TypeTag, EntwineError> {
        match self.get(id)? {
            Object::Record { tag, .. } => Ok(tag),
            other => Err(wrong_kind(id, other, "record")),
        }
    }

    /// The `(name, value)` pairs of a record, in field order.
    pub fn fields(&self, id: ObjectId) -> Result<&[(String, Value)], EntwineError> {
        match self.get(id)? {
            Object::Record { fields, .. } => Ok(fields),
            other => Err(wrong_kind(id, other, "record")),
        }
    }

    /// A single record field.
    pub fn field(&self, id: ObjectId, name: &str) -> Result<Option<&Value>, EntwineError> {
        Ok(field_of(self.fields(id)?, name))
    }

    /// Set a record field. Existing fields keep their position; new fields
    /// are appended.
    pub fn set_field(
        &mut self,
        id: ObjectId,
        name: &str,
        value: Value,
    ) -> Result<(), EntwineError> {
        check_field_name(name)?;
        let fields = match self.get_mut(id)? {
            Object::Record { fields, .. } => fields,
            other => {
                let kind = other.kind_name();
                return Err(EntwineError::InvalidOperation(format!(
                    "cannot set field `{name}` on {kind} {id}"
                )));
            }
        };
        match fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => fields.push((name.to_string(), value)),
        }
        Ok(())
    }

    // =========================================================================
    // SEQUENCES
    // =========================================================================

    /// The items of a list, tuple or set.
    pub fn items(&self, id: ObjectId) -> Result<&[Value], EntwineError> {
        match self.get(id)? {
            Object::Sequence { items, .. } => Ok(items),
            other => Err(wrong_kind(id, other, "sequence")),
        }
    }

    /// Append to a list or tuple. Sets use `set_insert`.
    pub fn push(&mut self, id: ObjectId, value: Value) -> Result<(), EntwineError> {
        match self.get_mut(id)? {
            Object::Sequence {
                kind: SequenceKind::List | SequenceKind::Tuple,
                items,
            } => {
                items.push(value);
                Ok(())
            }
            other => Err(wrong_kind_owned(id, other.kind_name(), "list or tuple")),
        }
    }

    /// Overwrite the item at `index` of a list or tuple.
    pub(crate) fn set_item(
        &mut self,
        id: ObjectId,
        index: usize,
        value: Value,
    ) -> Result<(), EntwineError> {
        let items = match self.get_mut(id)? {
            Object::Sequence { items, .. } => items,
            other => return Err(wrong_kind_owned(id, other.kind_name(), "sequence")),
        };
        let slot = items.get_mut(index).ok_or_else(|| {
            EntwineError::InvalidOperation(format!("item {index} out of range in {id}"))
        })?;
        *slot = value;
        Ok(())
    }

    /// Add a member to a set. Returns `false` if a key-equal member exists.
    pub fn set_insert(
        &mut self,
        id: ObjectId,
        member: Value,
        registry: &TypeRegistry,
    ) -> Result<bool, EntwineError> {
        self.set_insert_within(id, member, registry, &BTreeSet::new())
    }

    /// `set_insert` with `unsettled` records compared by identity.
    pub(crate) fn set_insert_within(
        &mut self,
        id: ObjectId,
        member: Value,
        registry: &TypeRegistry,
        unsettled: &BTreeSet<ObjectId>,
    ) -> Result<bool, EntwineError> {
        self.require_hashable(&member)?;
        if self.set_contains_within(id, &member, registry, unsettled)? {
            return Ok(false);
        }
        match self.get_mut(id)? {
            Object::Sequence {
                kind: SequenceKind::Set,
                items,
            } => {
                items.push(member);
                Ok(true)
            }
            other => Err(wrong_kind_owned(id, other.kind_name(), "set")),
        }
    }

    /// Check set membership under key equality.
    pub fn set_contains(
        &self,
        id: ObjectId,
        member: &Value,
        registry: &TypeRegistry,
    ) -> Result<bool, EntwineError> {
        self.set_contains_within(id, member, registry, &BTreeSet::new())
    }

    fn set_contains_within(
        &self,
        id: ObjectId,
        member: &Value,
        registry: &TypeRegistry,
        unsettled: &BTreeSet<ObjectId>,
    ) -> Result<bool, EntwineError> {
        let members = match self.get(id)? {
            Object::Sequence {
                kind: SequenceKind::Set,
                items,
            } => items,
            other => return Err(wrong_kind(id, other, "set")),
        };
        for existing in members {
            if self.keys_equal_within(existing, member, registry, unsettled)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // =========================================================================
    // MAPS
    // =========================================================================

    /// The entries of a map, in insertion order.
    pub fn entries(&self, id: ObjectId) -> Result<&[(Value, Value)], EntwineError> {
        match self.get(id)? {
            Object::Map { entries } => Ok(entries),
            other => Err(wrong_kind(id, other, "map")),
        }
    }

    fn entries_mut(&mut self, id: ObjectId) -> Result<&mut Vec<(Value, Value)>, EntwineError> {
        match self.get_mut(id)? {
            Object::Map { entries } => Ok(entries),
            other => Err(wrong_kind_owned(id, other.kind_name(), "map")),
        }
    }

    /// Insert into a map. Last write wins: if a key-equal entry exists, its
    /// value is replaced (the original key object and position are kept) and
    /// the old value returned.
    pub fn map_insert(
        &mut self,
        id: ObjectId,
        key: Value,
        value: Value,
        registry: &TypeRegistry,
    ) -> Result<Option<Value>, EntwineError> {
        self.require_hashable(&key)?;
        match self.find_entry(id, &key, registry)? {
            Some(position) => self.replace_entry_value(id, position, value).map(Some),
            None => {
                self.push_entry(id, key, value)?;
                Ok(None)
            }
        }
    }

    /// Look up a map value by key equality.
    ///
    /// This is a linear scan of the canonical entry list.
    pub fn map_get(
        &self,
        id: ObjectId,
        key: &Value,
        registry: &TypeRegistry,
    ) -> Result<Option<&Value>, EntwineError> {
        let position = self.find_entry(id, key, registry)?;
        Ok(position.and_then(|p| self.entries(id).ok()?.get(p).map(|(_, v)| v)))
    }

    /// The keys of a map, in insertion order.
    pub fn map_keys(&self, id: ObjectId) -> Result<Vec<&Value>, EntwineError> {
        Ok(self.entries(id)?.iter().map(|(k, _)| k).collect())
    }

    /// Position of the entry whose key equals `key`.
    pub(crate) fn find_entry(
        &self,
        id: ObjectId,
        key: &Value,
        registry: &TypeRegistry,
    ) -> Result<Option<usize>, EntwineError> {
        self.find_entry_within(id, key, registry, &BTreeSet::new())
    }

    /// `find_entry` with `unsettled` records compared by identity.
    pub(crate) fn find_entry_within(
        &self,
        id: ObjectId,
        key: &Value,
        registry: &TypeRegistry,
        unsettled: &BTreeSet<ObjectId>,
    ) -> Result<Option<usize>, EntwineError> {
        for (position, (existing, _)) in self.entries(id)?.iter().enumerate() {
            if self.keys_equal_within(existing, key, registry, unsettled)? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Append an entry without an equality check.
    pub(crate) fn push_entry(
        &mut self,
        id: ObjectId,
        key: Value,
        value: Value,
    ) -> Result<(), EntwineError> {
        self.entries_mut(id)?.push((key, value));
        Ok(())
    }

    /// Overwrite the value of the entry at `position`, returning the old one.
    pub(crate) fn replace_entry_value(
        &mut self,
        id: ObjectId,
        position: usize,
        value: Value,
    ) -> Result<Value, EntwineError> {
        let entry = self.entries_mut(id)?.get_mut(position).ok_or_else(|| {
            EntwineError::InvalidOperation(format!("entry {position} out of range in {id}"))
        })?;
        Ok(std::mem::replace(&mut entry.1, value))
    }

    // =========================================================================
    // KEY EQUALITY
    // =========================================================================

    /// Check whether a value can serve as a mapping key or set member.
    ///
    /// Scalars and records are hashable; tuples are hashable when all their
    /// items are; lists, sets and maps are not.
    pub fn is_hashable(&self, value: &Value) -> Result<bool, EntwineError> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![value];
        while let Some(current) = pending.pop() {
            let Value::Ref(id) = current else {
                continue;
            };
            if !seen.insert(*id) {
                continue;
            }
            match self.get(*id)? {
                Object::Record { .. } => {}
                Object::Sequence {
                    kind: SequenceKind::Tuple,
                    items,
                } => pending.extend(items),
                Object::Sequence { .. } | Object::Map { .. } => return Ok(false),
            }
        }
        Ok(true)
    }

    pub(crate) fn require_hashable(&self, value: &Value) -> Result<(), EntwineError> {
        if self.is_hashable(value)? {
            return Ok(());
        }
        let kind = match value {
            Value::Ref(id) => self.get(*id)?.kind_name(),
            Value::Scalar(s) => s.kind_name(),
        };
        Err(EntwineError::InvalidOperation(format!(
            "unhashable {kind} cannot be used as a key"
        )))
    }

    /// Key equality.
    ///
    /// - Scalars compare exactly (`Scalar::same_as`)
    /// - A reference equals itself
    /// - Records of a type with declared key fields compare by those fields
    /// - Other records compare by identity only
    /// - Tuples compare item by item
    ///
    /// Cyclic key structures are handled by assuming a pair under comparison
    /// is equal when it is met again.
    pub fn keys_equal<'a>(
        &'a self,
        left: &'a Value,
        right: &'a Value,
        registry: &TypeRegistry,
    ) -> Result<bool, EntwineError> {
        self.keys_equal_within(left, right, registry, &BTreeSet::new())
    }

    /// Key equality where records in `unsettled` compare by identity only.
    ///
    /// A record still being populated has placeholder key fields; comparing
    /// them would make distinct records look equal.
    pub(crate) fn keys_equal_within<'a>(
        &'a self,
        left: &'a Value,
        right: &'a Value,
        registry: &TypeRegistry,
        unsettled: &BTreeSet<ObjectId>,
    ) -> Result<bool, EntwineError> {
        let mut assumed = BTreeSet::new();
        let mut pending = vec![(left, right)];

        while let Some((a, b)) = pending.pop() {
            let (a, b) = match (a, b) {
                (Value::Scalar(x), Value::Scalar(y)) => {
                    if !x.same_as(y) {
                        return Ok(false);
                    }
                    continue;
                }
                (Value::Ref(a), Value::Ref(b)) => (*a, *b),
                _ => return Ok(false),
            };
            if a == b || !assumed.insert((a, b)) {
                continue;
            }

            match (self.get(a)?, self.get(b)?) {
                (
                    Object::Record {
                        tag: tag_a,
                        fields: fields_a,
                    },
                    Object::Record {
                        tag: tag_b,
                        fields: fields_b,
                    },
                ) => {
                    if tag_a != tag_b || unsettled.contains(&a) || unsettled.contains(&b) {
                        return Ok(false);
                    }
                    let Some(key_fields) = registry
                        .get(tag_a.as_str())
                        .and_then(|info| info.key_fields())
                    else {
                        return Ok(false);
                    };
                    for name in key_fields {
                        match (field_of(fields_a, name), field_of(fields_b, name)) {
                            (Some(x), Some(y)) => pending.push((x, y)),
                            (None, None) => {}
                            _ => return Ok(false),
                        }
                    }
                }
                (
                    Object::Sequence {
                        kind: SequenceKind::Tuple,
                        items: items_a,
                    },
                    Object::Sequence {
                        kind: SequenceKind::Tuple,
                        items: items_b,
                    },
                ) => {
                    if items_a.len() != items_b.len() {
                        return Ok(false);
                    }
                    pending.extend(items_a.iter().zip(items_b));
                }
                _ => return Ok(false),
            }
        }

        Ok(true)
    }

    /// Position of the first key that equals an earlier one, if any.
    pub(crate) fn duplicate_key(
        &self,
        keys: &[&Value],
        registry: &TypeRegistry,
    ) -> Result<Option<usize>, EntwineError> {
        for (position, key) in keys.iter().enumerate() {
            for earlier in &keys[..position] {
                if self.keys_equal(earlier, key, registry)? {
                    return Ok(Some(position));
                }
            }
        }
        Ok(None)
    }

    /// Fold key-equal entries of a map or set together.
    ///
    /// Maps keep the first key and its position with the last value; sets
    /// keep the first member. Returns the number of entries removed.
    pub(crate) fn collapse_duplicate_keys(
        &mut self,
        id: ObjectId,
        registry: &TypeRegistry,
    ) -> Result<usize, EntwineError> {
        let keys: Vec<Value> = match self.get(id)? {
            Object::Map { entries } => entries.iter().map(|(k, _)| k.clone()).collect(),
            Object::Sequence {
                kind: SequenceKind::Set,
                items,
            } => items.clone(),
            other => return Err(wrong_kind(id, other, "map or set")),
        };

        // slot[i]: position in the collapsed list that entry i folds into
        let mut kept: Vec<usize> = Vec::with_capacity(keys.len());
        let mut slot = Vec::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let mut found = None;
            for (position, &first) in kept.iter().enumerate() {
                if self.keys_equal(&keys[first], key, registry)? {
                    found = Some(position);
                    break;
                }
            }
            match found {
                Some(position) => slot.push(position),
                None => {
                    slot.push(kept.len());
                    kept.push(i);
                }
            }
        }

        let removed = keys.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }
        match self.get_mut(id)? {
            Object::Map { entries } => {
                let mut collapsed: Vec<(Value, Value)> = Vec::with_capacity(kept.len());
                for ((key, value), position) in std::mem::take(entries).into_iter().zip(slot) {
                    match collapsed.get_mut(position) {
                        Some(entry) => entry.1 = value,
                        None => collapsed.push((key, value)),
                    }
                }
                *entries = collapsed;
            }
            Object::Sequence { items, .. } => {
                let kept: BTreeSet<usize> = kept.into_iter().collect();
                *items = std::mem::take(items)
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| kept.contains(i))
                    .map(|(_, member)| member)
                    .collect();
            }
            Object::Record { .. } => {}
        }
        Ok(removed)
    }
}

// =============================================================================
// OBJECT GRAPH
// =============================================================================

/// A heap together with its root value: the unit the codec encodes and
/// decodes.
#[derive(Debug, Clone)]
pub struct ObjectGraph {
    pub heap: Heap,
    pub root: Value,
}

impl ObjectGraph {
    #[must_use]
    pub fn new(heap: Heap, root: Value) -> Self {
        Self { heap, root }
    }

    /// The root object, if the root is a reference.
    #[must_use]
    pub fn root_id(&self) -> Option<ObjectId> {
        self.root.as_object()
    }
}

// =============================================================================
// STRUCTURAL COMPARISON
// =============================================================================

/// Check whether two graphs are the same up to renaming of handles.
///
/// Requires a one-to-one correspondence between reachable objects, so this
/// compares aliasing and cycles as well as contents. Record fields compare
/// by name (field order is not significant); sequence items and map entries
/// compare in order.
#[must_use]
pub fn isomorphic(left: &Heap, left_root: &Value, right: &Heap, right_root: &Value) -> bool {
    let mut forward: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
    let mut backward: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
    let mut pending = vec![(left_root, right_root)];

    while let Some((l, r)) = pending.pop() {
        let (l, r) = match (l, r) {
            (Value::Scalar(x), Value::Scalar(y)) => {
                if !x.same_as(y) {
                    return false;
                }
                continue;
            }
            (Value::Ref(l), Value::Ref(r)) => (*l, *r),
            _ => return false,
        };

        match (forward.get(&l), backward.get(&r)) {
            (Some(mapped_r), Some(mapped_l)) => {
                if *mapped_r != r || *mapped_l != l {
                    return false;
                }
                continue;
            }
            (None, None) => {
                forward.insert(l, r);
                backward.insert(r, l);
            }
            _ => return false,
        }

        let (Ok(lo), Ok(ro)) = (left.get(l), right.get(r)) else {
            return false;
        };
        match (lo, ro) {
            (
                Object::Record {
                    tag: tag_l,
                    fields: fields_l,
                },
                Object::Record {
                    tag: tag_r,
                    fields: fields_r,
                },
            ) => {
                if tag_l != tag_r || fields_l.len() != fields_r.len() {
                    return false;
                }
                for (name, value) in fields_l {
                    let Some(other) = field_of(fields_r, name) else {
                        return false;
                    };
                    pending.push((value, other));
                }
            }
            (
                Object::Sequence {
                    kind: kind_l,
                    items: items_l,
                },
                Object::Sequence {
                    kind: kind_r,
                    items: items_r,
                },
            ) => {
                if kind_l != kind_r || items_l.len() != items_r.len() {
                    return false;
                }
                pending.extend(items_l.iter().zip(items_r));
            }
            (Object::Map { entries: entries_l }, Object::Map { entries: entries_r }) => {
                if entries_l.len() != entries_r.len() {
                    return false;
                }
                for ((kl, vl), (kr, vr)) in entries_l.iter().zip(entries_r) {
                    pending.push((kl, kr));
                    pending.push((vl, vr));
                }
            }
            _ => return false,
        }
    }

    true
}

// =============================================================================
// HELPERS
// =============================================================================

fn field_of<'a>(fields: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn check_field_name(name: &str) -> Result<(), EntwineError> {
    if is_reserved(name) {
        return Err(EntwineError::InvalidOperation(format!(
            "field name `{name}` uses the reserved marker prefix"
        )));
    }
    Ok(())
}

fn wrong_kind(id: ObjectId, object: &Object, expected: &str) -> EntwineError {
    wrong_kind_owned(id, object.kind_name(), expected)
}

fn wrong_kind_owned(id: ObjectId, actual: &str, expected: &str) -> EntwineError {
    EntwineError::InvalidOperation(format!("{id} is a {actual}, expected a {expected}"))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeInfo;

    fn keyed_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeInfo::new("wizard.Wizard")
                    .with_fields(["name", "spells"])
                    .with_key_fields(["name"]),
            )
            .expect("register");
        registry
            .register(TypeInfo::new("wizard.Spell").with_fields(["name"]))
            .expect("register");
        registry
    }

    #[test]
    fn alloc_assigns_dense_handles() {
        let mut heap = Heap::new();
        let a = heap.list(vec![]);
        let b = heap.map();
        let c = heap.record("t.T", Vec::<(String, Value)>::new()).expect("record");
        assert_eq!((a, b, c), (ObjectId(0), ObjectId(1), ObjectId(2)));
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn reserved_field_names_rejected() {
        let mut heap = Heap::new();
        let result = heap.record("t.T", [("$id", Value::null())]);
        assert!(matches!(result, Err(EntwineError::InvalidOperation(_))));

        let id = heap.record("t.T", [("ok", Value::null())]).expect("record");
        assert!(heap.set_field(id, "$ref", Value::null()).is_err());
    }

    #[test]
    fn set_field_upserts_in_place() {
        let mut heap = Heap::new();
        let id = heap
            .record("t.T", [("a", Value::from(1i64)), ("b", Value::from(2i64))])
            .expect("record");

        heap.set_field(id, "a", Value::from(10i64)).expect("set");
        heap.set_field(id, "c", Value::from(3i64)).expect("set");

        let names: Vec<_> = heap
            .fields(id)
            .expect("fields")
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(heap.field(id, "a").expect("field"), Some(&Value::from(10i64)));
    }

    #[test]
    fn wrong_kind_operations_fail() {
        let mut heap = Heap::new();
        let list = heap.list(vec![]);
        let map = heap.map();
        assert!(heap.fields(list).is_err());
        assert!(heap.push(map, Value::null()).is_err());
        assert!(heap.entries(list).is_err());
        assert!(matches!(
            heap.get(ObjectId(99)),
            Err(EntwineError::ObjectNotFound(ObjectId(99)))
        ));
    }

    #[test]
    fn map_insert_last_write_wins() {
        let registry = TypeRegistry::new();
        let mut heap = Heap::new();
        let map = heap.map();

        assert!(
            heap.map_insert(map, Value::text("k"), Value::from(1i64), &registry)
                .expect("insert")
                .is_none()
        );
        heap.map_insert(map, Value::text("other"), Value::from(0i64), &registry)
            .expect("insert");
        let old = heap
            .map_insert(map, Value::text("k"), Value::from(2i64), &registry)
            .expect("insert");

        assert_eq!(old, Some(Value::from(1i64)));
        assert_eq!(heap.entries(map).expect("entries").len(), 2);
        assert_eq!(heap.entries(map).expect("entries")[0].1, Value::from(2i64));
    }

    #[test]
    fn keyed_records_match_by_key_fields() {
        let registry = keyed_registry();
        let mut heap = Heap::new();
        let morgana = heap
            .record("wizard.Wizard", [("name", Value::text("Morgana"))])
            .expect("record");
        let lookalike = heap
            .record("wizard.Wizard", [("name", Value::text("Morgana"))])
            .expect("record");
        let merlin = heap
            .record("wizard.Wizard", [("name", Value::text("Merlin"))])
            .expect("record");

        let map = heap.map();
        heap.map_insert(map, Value::Ref(morgana), Value::from(1i64), &registry)
            .expect("insert");

        let found = heap
            .map_get(map, &Value::Ref(lookalike), &registry)
            .expect("get");
        assert_eq!(found, Some(&Value::from(1i64)));
        assert!(
            heap.map_get(map, &Value::Ref(merlin), &registry)
                .expect("get")
                .is_none()
        );
    }

    #[test]
    fn records_without_key_fields_match_by_identity() {
        let registry = keyed_registry();
        let mut heap = Heap::new();
        let a = heap
            .record("wizard.Spell", [("name", Value::text("geas"))])
            .expect("record");
        let b = heap
            .record("wizard.Spell", [("name", Value::text("geas"))])
            .expect("record");

        assert!(heap.keys_equal(&Value::Ref(a), &Value::Ref(a), &registry).expect("eq"));
        assert!(!heap.keys_equal(&Value::Ref(a), &Value::Ref(b), &registry).expect("eq"));
    }

    #[test]
    fn tuples_compare_itemwise() {
        let registry = TypeRegistry::new();
        let mut heap = Heap::new();
        let a = heap.tuple(vec![Value::from(1i64), Value::text("x")]);
        let b = heap.tuple(vec![Value::from(1i64), Value::text("x")]);
        let c = heap.tuple(vec![Value::from(1i64)]);

        assert!(heap.keys_equal(&Value::Ref(a), &Value::Ref(b), &registry).expect("eq"));
        assert!(!heap.keys_equal(&Value::Ref(a), &Value::Ref(c), &registry).expect("eq"));
    }

    #[test]
    fn cyclic_key_fields_terminate() {
        let mut registry = TypeRegistry::new();
        registry
            .register(TypeInfo::new("n.Node").with_key_fields(["next"]))
            .expect("register");
        let mut heap = Heap::new();
        let a = heap.record("n.Node", [("next", Value::null())]).expect("record");
        let b = heap.record("n.Node", [("next", Value::null())]).expect("record");
        heap.set_field(a, "next", Value::Ref(a)).expect("set");
        heap.set_field(b, "next", Value::Ref(b)).expect("set");

        assert!(heap.keys_equal(&Value::Ref(a), &Value::Ref(b), &registry).expect("eq"));
    }

    #[test]
    fn unhashable_keys_rejected() {
        let registry = TypeRegistry::new();
        let mut heap = Heap::new();
        let list = heap.list(vec![]);
        let tuple_with_list = heap.tuple(vec![Value::Ref(list)]);
        let map = heap.map();

        assert!(!heap.is_hashable(&Value::Ref(list)).expect("hashable"));
        assert!(!heap.is_hashable(&Value::Ref(tuple_with_list)).expect("hashable"));
        assert!(
            heap.map_insert(map, Value::Ref(list), Value::null(), &registry)
                .is_err()
        );
    }

    #[test]
    fn set_insert_deduplicates() {
        let registry = TypeRegistry::new();
        let mut heap = Heap::new();
        let set = heap.set();
        assert!(heap.set_insert(set, Value::from(1i64), &registry).expect("insert"));
        assert!(!heap.set_insert(set, Value::from(1i64), &registry).expect("insert"));
        assert!(heap.set_insert(set, Value::text("1"), &registry).expect("insert"));
        assert_eq!(heap.items(set).expect("items").len(), 2);
    }

    #[test]
    fn isomorphic_detects_aliasing_difference() {
        let mut shared = Heap::new();
        let s = shared.list(vec![]);
        let root_shared = shared.tuple(vec![Value::Ref(s), Value::Ref(s)]);

        let mut copied = Heap::new();
        let x = copied.list(vec![]);
        let y = copied.list(vec![]);
        let root_copied = copied.tuple(vec![Value::Ref(x), Value::Ref(y)]);

        assert!(isomorphic(
            &shared,
            &Value::Ref(root_shared),
            &shared,
            &Value::Ref(root_shared)
        ));
        assert!(!isomorphic(
            &shared,
            &Value::Ref(root_shared),
            &copied,
            &Value::Ref(root_copied)
        ));
    }

    #[test]
    fn isomorphic_ignores_field_order() {
        let mut a = Heap::new();
        let ra = a
            .record("t.T", [("x", Value::from(1i64)), ("y", Value::from(2i64))])
            .expect("record");
        let mut b = Heap::new();
        let rb = b
            .record("t.T", [("y", Value::from(2i64)), ("x", Value::from(1i64))])
            .expect("record");

        assert!(isomorphic(&a, &Value::Ref(ra), &b, &Value::Ref(rb)));
    }
}
