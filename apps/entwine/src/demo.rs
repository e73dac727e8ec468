//! # Wizard Scenario
//!
//! A small world where wizards cast spells on each other. Each wizard keeps
//! a map from target wizard to the spells cast on that target, so the graph
//! carries cycles, aliasing and composite keys at once:
//! - every spell points back at its caster and its target
//! - Merlin is a key in his own map
//! - two distinct wizards share the name Morgana

use entwine_core::{EntwineError, Heap, ObjectGraph, ObjectId, TypeInfo, TypeRegistry, Value};

pub const WORLD: &str = "wizard.World";
pub const WIZARD: &str = "wizard.Wizard";
pub const SPELL: &str = "wizard.Spell";

/// Registry for the three scenario types.
///
/// Wizards compare by name when used as keys. Spells are rebuilt through a
/// constructor that insists on a text name.
pub fn registry() -> Result<TypeRegistry, EntwineError> {
    let mut registry = TypeRegistry::new();
    registry.register(TypeInfo::new(WORLD).with_fields(["wizards"]))?;
    registry.register(
        TypeInfo::new(WIZARD)
            .with_fields(["name", "spells"])
            .with_key_fields(["name"]),
    )?;
    registry.register(
        TypeInfo::new(SPELL)
            .with_fields(["caster", "target", "name"])
            .with_constructor(build_spell),
    )?;
    Ok(registry)
}

fn build_spell(fields: Vec<(String, Value)>) -> Result<Vec<(String, Value)>, String> {
    match fields.iter().find(|(name, _)| name == "name") {
        Some((_, value)) if value.as_text().is_some() => Ok(fields),
        _ => Err("spell needs a text name".to_string()),
    }
}

/// Build the world and return it as a graph rooted at the world record.
pub fn world(registry: &TypeRegistry) -> Result<ObjectGraph, EntwineError> {
    let mut heap = Heap::new();
    let wizards = heap.list(vec![]);
    let world = heap.record(WORLD, [("wizards", Value::Ref(wizards))])?;

    let merlin = wizard(&mut heap, wizards, "Merlin")?;
    let morgana = wizard(&mut heap, wizards, "Morgana")?;
    wizard(&mut heap, wizards, "Morgana")?;

    cast(&mut heap, registry, merlin, morgana, "magic-missile")?;
    cast(&mut heap, registry, merlin, merlin, "stone-skin")?;
    cast(&mut heap, registry, morgana, merlin, "geas")?;

    Ok(ObjectGraph::new(heap, Value::Ref(world)))
}

fn wizard(heap: &mut Heap, wizards: ObjectId, name: &str) -> Result<ObjectId, EntwineError> {
    let spells = heap.map();
    let wizard = heap.record(WIZARD, [("name", Value::text(name)), ("spells", Value::Ref(spells))])?;
    heap.push(wizards, Value::Ref(wizard))?;
    Ok(wizard)
}

fn cast(
    heap: &mut Heap,
    registry: &TypeRegistry,
    caster: ObjectId,
    target: ObjectId,
    name: &str,
) -> Result<(), EntwineError> {
    let spell = heap.record(
        SPELL,
        [
            ("caster", Value::Ref(caster)),
            ("target", Value::Ref(target)),
            ("name", Value::text(name)),
        ],
    )?;
    let spells = heap
        .field(caster, "spells")?
        .and_then(Value::as_object)
        .ok_or_else(|| EntwineError::InvalidOperation("wizard has no spell map".to_string()))?;

    let existing = heap
        .map_get(spells, &Value::Ref(target), registry)?
        .and_then(Value::as_object);
    let list = match existing {
        Some(list) => list,
        None => {
            let list = heap.list(vec![]);
            heap.map_insert(spells, Value::Ref(target), Value::Ref(list), registry)?;
            list
        }
    };
    heap.push(list, Value::Ref(spell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entwine_core::{Decoder, Encoder, Options, isomorphic};

    #[test]
    fn world_roundtrips_through_the_spell_constructor() {
        let registry = registry().expect("registry");
        let graph = world(&registry).expect("world");
        let options = Options::default();

        let text = Encoder::new(&registry, &options)
            .encode(&graph.heap, &graph.root)
            .expect("encode");
        let decoded = Decoder::new(&registry, &options).decode(&text).expect("decode");

        assert!(isomorphic(&graph.heap, &graph.root, &decoded.heap, &decoded.root));
    }

    #[test]
    fn constructor_rejects_nameless_spell() {
        assert!(build_spell(vec![("name".to_string(), Value::null())]).is_err());
        assert!(build_spell(vec![("name".to_string(), Value::text("geas"))]).is_ok());
    }
}
