//! # CLI Configuration
//!
//! An optional TOML file supplies codec options and the record types the
//! registry knows about:
//!
//! ```toml
//! [options]
//! indent = 2
//! strict_types = false
//!
//! [[types]]
//! tag = "wizard.Wizard"
//! fields = ["name", "spells"]
//! key_fields = ["name"]
//! ```

use super::commands::{validate_file_path, validate_file_size};
use entwine_core::{EntwineError, Heap, Object, Options, TypeInfo, TypeRegistry};
use serde::Deserialize;
use std::path::Path;

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Parsed configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub options: Options,
    pub types: Vec<TypeSpec>,
}

/// One registered record type.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    pub tag: String,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Fields compared when a record of this type is a mapping key.
    #[serde(default)]
    pub key_fields: Option<Vec<String>>,
}

impl CliConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, EntwineError> {
        let path = validate_file_path(path)?;
        validate_file_size(&path, MAX_CONFIG_FILE_SIZE)?;
        let text = std::fs::read_to_string(&path)
            .map_err(|e| EntwineError::IoError(format!("Cannot read config: {}", e)))?;
        let config = Self::parse(&text)?;
        tracing::debug!(
            path = %path.display(),
            types = config.types.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse config text.
    pub fn parse(text: &str) -> Result<Self, EntwineError> {
        let config: Self =
            toml::from_str(text).map_err(|e| EntwineError::InvalidConfig(e.to_string()))?;
        config.options.validate()?;
        Ok(config)
    }

    /// Build a registry holding every configured type.
    pub fn registry(&self) -> Result<TypeRegistry, EntwineError> {
        let mut registry = TypeRegistry::new();
        for spec in &self.types {
            let mut info = TypeInfo::new(spec.tag.as_str()).with_fields(&spec.fields);
            if let Some(key_fields) = &spec.key_fields {
                info = info.with_key_fields(key_fields);
            }
            registry.register(info)?;
        }
        Ok(registry)
    }
}

/// Register every record tag in `heap` the registry does not know yet.
///
/// A leniently decoded document keeps its unknown tags on generic records;
/// adopting them lets the re-encode write the tags back out. Returns the
/// number of tags adopted.
pub fn adopt_tags(registry: &mut TypeRegistry, heap: &Heap) -> Result<usize, EntwineError> {
    let mut adopted = 0;
    for (_, object) in heap.objects() {
        if let Object::Record { tag, .. } = object
            && registry.get(tag.as_str()).is_none()
        {
            registry.register(TypeInfo::new(tag.clone()))?;
            tracing::info!(tag = %tag, "adopted unregistered type tag");
            adopted += 1;
        }
    }
    Ok(adopted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entwine_core::Value;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CliConfig::parse("").expect("parse");
        assert_eq!(config.options, Options::default());
        assert!(config.types.is_empty());
    }

    #[test]
    fn types_build_registry() {
        let config = CliConfig::parse(
            r#"
            [options]
            indent = 2

            [[types]]
            tag = "geo.Point"
            fields = ["x", "y"]
            key_fields = ["x", "y"]

            [[types]]
            tag = "geo.Shape"
            "#,
        )
        .expect("parse");
        assert_eq!(config.options.indent, Some(2));

        let registry = config.registry().expect("registry");
        assert_eq!(registry.len(), 2);
        let point = registry.get("geo.Point").expect("point");
        assert_eq!(point.fields(), ["x", "y"]);
        assert_eq!(point.key_fields(), Some(&["x".to_string(), "y".to_string()][..]));
        assert!(registry.get("geo.Shape").expect("shape").key_fields().is_none());
    }

    #[test]
    fn duplicate_type_rejected() {
        let config = CliConfig::parse(
            r#"
            [[types]]
            tag = "a.A"
            [[types]]
            tag = "a.A"
            "#,
        )
        .expect("parse");
        assert!(matches!(
            config.registry(),
            Err(EntwineError::RegistryConflict(_))
        ));
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            CliConfig::parse("[options]\nturbo = true\n"),
            Err(EntwineError::InvalidConfig(_))
        ));
        assert!(matches!(
            CliConfig::parse("[options]\nmax_depth = 0\n"),
            Err(EntwineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn adopt_registers_each_tag_once() {
        let mut heap = Heap::new();
        heap.record("x.A", [("v", Value::from(1_i64))]).expect("record");
        heap.record("x.A", [("v", Value::from(2_i64))]).expect("record");
        heap.record("x.B", Vec::<(String, Value)>::new()).expect("record");
        heap.list(vec![]);

        let mut registry = TypeRegistry::new();
        registry.register(TypeInfo::new("x.B")).expect("register");
        assert_eq!(adopt_tags(&mut registry, &heap).expect("adopt"), 1);
        assert!(registry.get("x.A").is_some());
        assert_eq!(adopt_tags(&mut registry, &heap).expect("adopt"), 0);
    }
}
