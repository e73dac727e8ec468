//! # Wire Format
//!
//! JSON rendering and parsing of the tagged tree.
//!
//! ## Layout
//!
//! - scalars are native JSON, except bytes (`{"$bytes": "<base64>"}`) and
//!   non-finite floats (`{"$float": "nan"}`)
//! - lists, tuples and sets are `{"$id": n, "$items"|"$tuple"|"$set": [...]}`
//! - text-keyed mappings are `{"$id": n, "key": value, ...}`
//! - other mappings are `{"$id": n, "$entries": [[key, value], ...]}`
//! - typed records are `{"$id": n, "$type": "tag", "field": value, ...}`
//! - back-references are `{"$ref": n}`
//!
//! `$id` is omitted when reference tracking is off. Object key order is
//! significant and preserved.

use crate::primitives::{
    BYTES_KEY, ENTRIES_KEY, FLOAT_KEY, ID_KEY, ITEMS_KEY, JSON_LEVELS_PER_DEPTH,
    MAX_DOCUMENT_BYTES, REF_KEY, SET_KEY, TUPLE_KEY, TYPE_KEY, is_reserved,
};
use crate::tree::{Document, MapForm, TaggedNode};
use crate::{EntwineError, Scalar, SequenceKind, TypeTag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number, Value as JsonValue};

// =============================================================================
// RENDER
// =============================================================================

/// Render a tree as JSON text, compact or indented.
pub fn render(node: &TaggedNode, indent: Option<usize>) -> Result<String, EntwineError> {
    let json = to_json(node)?;
    let Some(width) = indent else {
        return serde_json::to_string(&json).map_err(|e| EntwineError::Syntax(e.to_string()));
    };

    let spaces = vec![b' '; width];
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&spaces));
    json.serialize(&mut serializer)
        .map_err(|e| EntwineError::Syntax(e.to_string()))?;
    String::from_utf8(out).map_err(|e| EntwineError::Syntax(e.to_string()))
}

/// Convert a tree to a JSON value.
pub fn to_json(node: &TaggedNode) -> Result<JsonValue, EntwineError> {
    Ok(match node {
        TaggedNode::Scalar(scalar) => scalar_to_json(scalar),
        TaggedNode::BackRef(index) => marker(REF_KEY, JsonValue::from(*index)),
        TaggedNode::Sequence { index, kind, items } => {
            let mut map = with_index(*index);
            let items = items.iter().map(to_json).collect::<Result<Vec<_>, _>>()?;
            map.insert(sequence_key(*kind).to_string(), JsonValue::Array(items));
            JsonValue::Object(map)
        }
        TaggedNode::Mapping {
            index,
            form: MapForm::Text,
            entries,
        } => {
            let mut map = with_index(*index);
            for (key, value) in entries {
                let key = key.as_text().ok_or_else(|| {
                    EntwineError::InvalidOperation("text-form mapping key is not text".to_string())
                })?;
                map.insert(key.to_string(), to_json(value)?);
            }
            JsonValue::Object(map)
        }
        TaggedNode::Mapping {
            index,
            form: MapForm::Entries,
            entries,
        } => {
            let mut map = with_index(*index);
            let pairs = entries
                .iter()
                .map(|(k, v)| Ok(JsonValue::Array(vec![to_json(k)?, to_json(v)?])))
                .collect::<Result<Vec<_>, EntwineError>>()?;
            map.insert(ENTRIES_KEY.to_string(), JsonValue::Array(pairs));
            JsonValue::Object(map)
        }
        TaggedNode::Typed { index, tag, fields } => {
            let mut map = with_index(*index);
            map.insert(TYPE_KEY.to_string(), JsonValue::from(tag.as_str()));
            for (name, value) in fields {
                map.insert(name.clone(), to_json(value)?);
            }
            JsonValue::Object(map)
        }
    })
}

fn scalar_to_json(scalar: &Scalar) -> JsonValue {
    match scalar {
        Scalar::Null => JsonValue::Null,
        Scalar::Bool(b) => JsonValue::Bool(*b),
        Scalar::Int(i) => JsonValue::Number(Number::from(*i)),
        Scalar::Float(f) => match Number::from_f64(*f) {
            Some(n) => JsonValue::Number(n),
            None => marker(FLOAT_KEY, JsonValue::from(non_finite_name(*f))),
        },
        Scalar::Text(s) => JsonValue::String(s.clone()),
        Scalar::Bytes(bytes) => marker(BYTES_KEY, JsonValue::String(STANDARD.encode(bytes))),
    }
}

fn non_finite_name(f: f64) -> &'static str {
    if f.is_nan() {
        "nan"
    } else if f.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

fn with_index(index: Option<usize>) -> Map<String, JsonValue> {
    let mut map = Map::new();
    if let Some(index) = index {
        map.insert(ID_KEY.to_string(), JsonValue::from(index));
    }
    map
}

fn marker(key: &str, value: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    JsonValue::Object(map)
}

const fn sequence_key(kind: SequenceKind) -> &'static str {
    match kind {
        SequenceKind::List => ITEMS_KEY,
        SequenceKind::Tuple => TUPLE_KEY,
        SequenceKind::Set => SET_KEY,
    }
}

// =============================================================================
// PARSE
// =============================================================================

/// Parse JSON text into a tree.
///
/// Size and nesting are checked before the JSON parser runs.
pub fn parse(text: &str, max_depth: usize) -> Result<Document, EntwineError> {
    if text.len() > MAX_DOCUMENT_BYTES {
        return Err(EntwineError::DocumentTooLarge {
            size: text.len(),
            limit: MAX_DOCUMENT_BYTES,
        });
    }
    check_nesting(text, max_depth)?;

    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let json = JsonValue::deserialize(&mut deserializer)
        .map_err(|e| EntwineError::Syntax(e.to_string()))?;
    deserializer
        .end()
        .map_err(|e| EntwineError::Syntax(e.to_string()))?;

    let mut reader = Reader { declared: 0 };
    let root = reader.node(json)?;
    Ok(Document {
        root,
        declared: reader.declared,
    })
}

/// Reject documents whose bracket nesting exceeds what `max_depth`
/// composites can open.
///
/// Iterative, so it is safe to run on hostile input before the recursive
/// parser sees it.
pub fn check_nesting(text: &str, max_depth: usize) -> Result<(), EntwineError> {
    let ceiling = max_depth
        .saturating_mul(JSON_LEVELS_PER_DEPTH)
        .saturating_add(1);
    let mut level = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                level += 1;
                if level > ceiling {
                    return Err(EntwineError::DepthExceeded { limit: max_depth });
                }
            }
            b']' | b'}' => level = level.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// JSON → tree conversion. Tracks declared indices in document order.
struct Reader {
    declared: usize,
}

impl Reader {
    fn node(&mut self, json: JsonValue) -> Result<TaggedNode, EntwineError> {
        Ok(match json {
            JsonValue::Null => TaggedNode::NULL,
            JsonValue::Bool(b) => TaggedNode::Scalar(Scalar::Bool(b)),
            JsonValue::Number(n) => TaggedNode::Scalar(number(&n)?),
            JsonValue::String(s) => TaggedNode::Scalar(Scalar::Text(s)),
            JsonValue::Array(items) => TaggedNode::Sequence {
                index: None,
                kind: SequenceKind::List,
                items: self.nodes(items)?,
            },
            JsonValue::Object(map) => self.object(map)?,
        })
    }

    fn nodes(&mut self, items: Vec<JsonValue>) -> Result<Vec<TaggedNode>, EntwineError> {
        items.into_iter().map(|item| self.node(item)).collect()
    }

    fn object(&mut self, map: Map<String, JsonValue>) -> Result<TaggedNode, EntwineError> {
        let shape = shape_of(&map)?;

        // Leaf markers stand alone
        match shape {
            Some(REF_KEY) => {
                only_key(&map, REF_KEY)?;
                return Ok(TaggedNode::BackRef(index_of(map.get(REF_KEY))?));
            }
            Some(BYTES_KEY) => {
                only_key(&map, BYTES_KEY)?;
                let payload = text_of(map.get(BYTES_KEY), BYTES_KEY)?;
                let bytes = STANDARD
                    .decode(payload)
                    .map_err(|e| EntwineError::MalformedDocument(format!("bad base64: {e}")))?;
                return Ok(TaggedNode::Scalar(Scalar::Bytes(bytes)));
            }
            Some(FLOAT_KEY) => {
                only_key(&map, FLOAT_KEY)?;
                let value = match text_of(map.get(FLOAT_KEY), FLOAT_KEY)? {
                    "nan" => f64::NAN,
                    "inf" => f64::INFINITY,
                    "-inf" => f64::NEG_INFINITY,
                    other => {
                        return Err(EntwineError::MalformedDocument(format!(
                            "unknown float marker `{other}`"
                        )));
                    }
                };
                return Ok(TaggedNode::Scalar(Scalar::Float(value)));
            }
            _ => {}
        }

        // Declared before any child is read, so indices follow pre-order
        let index = match map.get(ID_KEY) {
            Some(raw) => Some(self.declare(raw)?),
            None => None,
        };
        let markers = 1 + usize::from(index.is_some());

        match shape {
            Some(TYPE_KEY) => {
                let tag = TypeTag::new(text_of(map.get(TYPE_KEY), TYPE_KEY)?);
                let mut fields = Vec::with_capacity(map.len().saturating_sub(markers));
                for (name, value) in map {
                    if is_reserved(&name) {
                        continue;
                    }
                    let value = self.node(value)?;
                    fields.push((name, value));
                }
                Ok(TaggedNode::Typed { index, tag, fields })
            }
            Some(key @ (ITEMS_KEY | TUPLE_KEY | SET_KEY)) => {
                if map.len() != markers {
                    return Err(stray_keys(key));
                }
                let kind = match key {
                    TUPLE_KEY => SequenceKind::Tuple,
                    SET_KEY => SequenceKind::Set,
                    _ => SequenceKind::List,
                };
                let items = array_of(map, key)?;
                Ok(TaggedNode::Sequence {
                    index,
                    kind,
                    items: self.nodes(items)?,
                })
            }
            Some(ENTRIES_KEY) => {
                if map.len() != markers {
                    return Err(stray_keys(ENTRIES_KEY));
                }
                let mut entries = Vec::new();
                for pair in array_of(map, ENTRIES_KEY)? {
                    let JsonValue::Array(pair) = pair else {
                        return Err(bad_entry());
                    };
                    let [key, value]: [JsonValue; 2] =
                        pair.try_into().map_err(|_| bad_entry())?;
                    let key = self.node(key)?;
                    let value = self.node(value)?;
                    entries.push((key, value));
                }
                Ok(TaggedNode::Mapping {
                    index,
                    form: MapForm::Entries,
                    entries,
                })
            }
            _ => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, value) in map {
                    if key == ID_KEY {
                        continue;
                    }
                    let value = self.node(value)?;
                    entries.push((TaggedNode::Scalar(Scalar::Text(key)), value));
                }
                Ok(TaggedNode::Mapping {
                    index,
                    form: MapForm::Text,
                    entries,
                })
            }
        }
    }

    fn declare(&mut self, raw: &JsonValue) -> Result<usize, EntwineError> {
        let index = index_of(Some(raw))?;
        if index != self.declared {
            return Err(EntwineError::MalformedDocument(format!(
                "reference index {index} declared out of order (expected {})",
                self.declared
            )));
        }
        self.declared += 1;
        Ok(index)
    }
}

/// The shape marker of a JSON object, if it has one.
///
/// At most one shape marker may appear; `$id` is not a shape marker, and any
/// other reserved key is unknown.
fn shape_of(map: &Map<String, JsonValue>) -> Result<Option<&'static str>, EntwineError> {
    let mut shape = None;
    for key in map.keys() {
        if !is_reserved(key) || key == ID_KEY {
            continue;
        }
        let found = [
            REF_KEY,
            TYPE_KEY,
            ENTRIES_KEY,
            ITEMS_KEY,
            TUPLE_KEY,
            SET_KEY,
            BYTES_KEY,
            FLOAT_KEY,
        ]
        .into_iter()
        .find(|marker| *marker == key.as_str())
        .ok_or_else(|| EntwineError::MalformedDocument(format!("unknown marker `{key}`")))?;
        if let Some(previous) = shape {
            return Err(EntwineError::MalformedDocument(format!(
                "conflicting markers `{previous}` and `{found}`"
            )));
        }
        shape = Some(found);
    }
    Ok(shape)
}

fn number(n: &Number) -> Result<Scalar, EntwineError> {
    if let Some(i) = n.as_i64() {
        return Ok(Scalar::Int(i));
    }
    if n.is_u64() {
        return Err(EntwineError::MalformedDocument(format!(
            "integer {n} is out of range"
        )));
    }
    n.as_f64()
        .map(Scalar::Float)
        .ok_or_else(|| EntwineError::MalformedDocument(format!("unrepresentable number {n}")))
}

fn index_of(raw: Option<&JsonValue>) -> Result<usize, EntwineError> {
    raw.and_then(JsonValue::as_u64)
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| {
            EntwineError::MalformedDocument("reference index must be a non-negative integer".into())
        })
}

fn text_of<'a>(raw: Option<&'a JsonValue>, key: &str) -> Result<&'a str, EntwineError> {
    raw.and_then(JsonValue::as_str)
        .ok_or_else(|| EntwineError::MalformedDocument(format!("`{key}` must be a string")))
}

fn array_of(map: Map<String, JsonValue>, key: &str) -> Result<Vec<JsonValue>, EntwineError> {
    match map.into_iter().find(|(k, _)| k == key) {
        Some((_, JsonValue::Array(items))) => Ok(items),
        _ => Err(EntwineError::MalformedDocument(format!(
            "`{key}` must be an array"
        ))),
    }
}

fn only_key(map: &Map<String, JsonValue>, key: &str) -> Result<(), EntwineError> {
    if map.len() == 1 {
        Ok(())
    } else {
        Err(stray_keys(key))
    }
}

fn stray_keys(key: &str) -> EntwineError {
    EntwineError::MalformedDocument(format!("unexpected keys next to `{key}`"))
}

fn bad_entry() -> EntwineError {
    EntwineError::MalformedDocument("each entry must be a [key, value] pair".to_string())
}

// =============================================================================
// TESTS
// =============================================================================
