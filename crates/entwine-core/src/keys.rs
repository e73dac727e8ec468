//! # Key Codec
//!
//! Chooses the wire form of a mapping and admits decoded keys.
//!
//! A mapping whose keys are all plain text is written as a native JSON
//! object. Anything else goes to the entry-list form, where keys are encoded
//! like any other value and take part in reference tracking.

use crate::heap::Heap;
use crate::options::Options;
use crate::primitives::is_reserved;
use crate::tree::MapForm;
use crate::{EntwineError, Scalar, Value};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Pick the wire form for a mapping with these entries.
///
/// With composite keys disabled, scalar keys are stringified and the text
/// form is forced; a composite key, or a text key inside the reserved
/// namespace, cannot be written and fails.
pub fn form_for(entries: &[(Value, Value)], options: &Options) -> Result<MapForm, EntwineError> {
    let plain = entries
        .iter()
        .all(|(key, _)| key.as_text().is_some_and(|s| !is_reserved(s)));
    if plain {
        return Ok(MapForm::Text);
    }
    if options.encode_composite_keys {
        return Ok(MapForm::Entries);
    }
    for (key, _) in entries {
        match key {
            Value::Ref(_) => return Err(EntwineError::CompositeKeyRejected),
            Value::Scalar(Scalar::Text(s)) if is_reserved(s) => {
                return Err(EntwineError::InvalidOperation(format!(
                    "mapping key `{s}` collides with a reserved marker"
                )));
            }
            Value::Scalar(_) => {}
        }
    }
    Ok(MapForm::Text)
}

/// The text under which a key is written in the text form.
pub fn text_key(key: &Value) -> Result<String, EntwineError> {
    match key {
        Value::Scalar(scalar) => Ok(stringify(scalar)),
        Value::Ref(_) => Err(EntwineError::CompositeKeyRejected),
    }
}

/// Lossy textual surrogate of a scalar key.
///
/// Only used when composite keys are disabled; the original scalar kind is
/// not recoverable from the result.
#[must_use]
pub fn stringify(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => "null".to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => format!("{f:?}"),
        Scalar::Text(s) => s.clone(),
        Scalar::Bytes(bytes) => STANDARD.encode(bytes),
    }
}

/// Check that a decoded value can serve as a key or set member.
pub fn admit(heap: &Heap, key: &Value) -> Result<(), EntwineError> {
    if heap.is_hashable(key)? {
        return Ok(());
    }
    let kind = match key {
        Value::Ref(id) => heap.get(*id)?.kind_name(),
        Value::Scalar(scalar) => scalar.kind_name(),
    };
    Err(EntwineError::KeyReconstructionFailure(format!(
        "a {kind} cannot be used as a mapping key"
    )))
}
