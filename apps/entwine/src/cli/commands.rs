//! # CLI Command Implementations
//!
//! Each `cmd_*` function reads its input, runs the codec and prints a
//! report. The report-building halves are public so tests can check them
//! without capturing stdout.

use super::config::{CliConfig, adopt_tags};
use super::stats::{GraphStats, count_back_refs};
use crate::demo;
use entwine_core::{
    Decoder, Encoder, EntwineError, ObjectGraph, Options, TypeRegistry, isomorphic,
    primitives::MAX_DOCUMENT_BYTES, wire,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// PATH AND SIZE VALIDATION
// =============================================================================

/// Validate file size before reading.
pub(crate) fn validate_file_size(path: &Path, max_size: u64) -> Result<(), EntwineError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| EntwineError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(EntwineError::DocumentTooLarge {
            size: metadata.len() as usize,
            limit: max_size as usize,
        });
    }
    Ok(())
}

/// Canonicalize an input path and make sure it names a regular file.
pub(crate) fn validate_file_path(path: &Path) -> Result<PathBuf, EntwineError> {
    let canonical = path.canonicalize().map_err(|e| {
        EntwineError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(EntwineError::IoError(format!(
            "Path '{}' is not a file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path.
///
/// The file itself need not exist yet.
pub(crate) fn validate_output_path(path: &Path) -> Result<PathBuf, EntwineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        EntwineError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(EntwineError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| EntwineError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a document after validating its path and size.
fn read_document(file: &Path) -> Result<String, EntwineError> {
    let path = validate_file_path(file)?;
    validate_file_size(&path, MAX_DOCUMENT_BYTES as u64)?;
    std::fs::read_to_string(&path)
        .map_err(|e| EntwineError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}

/// Write a document to `output`, or to stdout when there is none.
fn write_document(text: &str, output: Option<&Path>, json_mode: bool) -> Result<(), EntwineError> {
    let Some(output) = output else {
        println!("{}", text);
        return Ok(());
    };

    let validated = validate_output_path(output)?;
    std::fs::write(&validated, text)
        .map_err(|e| EntwineError::IoError(format!("Write file: {}", e)))?;

    if json_mode {
        let report = serde_json::json!({
            "output": validated.to_string_lossy(),
            "bytes": text.len(),
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        println!("Wrote {} bytes to {:?}", text.len(), validated);
    }
    Ok(())
}

/// Decode with the configured registry, adopting unknown tags when lenient.
fn decode_for_reencode(
    config: &CliConfig,
    options: &Options,
    text: &str,
) -> Result<(TypeRegistry, ObjectGraph), EntwineError> {
    let mut registry = config.registry()?;
    let graph = Decoder::new(&registry, options).decode(text)?;
    if !options.strict_types {
        adopt_tags(&mut registry, &graph.heap)?;
    }
    Ok((registry, graph))
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// What `inspect` reports about a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub bytes: usize,
    /// Reference indices the document declares.
    pub declared: usize,
    pub back_refs: usize,
    #[serde(flatten)]
    pub graph: GraphStats,
}

/// Parse and decode `text`, then summarize it.
pub fn inspect_document(
    config: &CliConfig,
    options: &Options,
    text: &str,
) -> Result<InspectReport, EntwineError> {
    let document = wire::parse(text, options.max_depth)?;
    let declared = document.declared;
    let back_refs = count_back_refs(&document.root);

    let registry = config.registry()?;
    let graph = Decoder::new(&registry, options).decode_document(document)?;

    Ok(InspectReport {
        bytes: text.len(),
        declared,
        back_refs,
        graph: GraphStats::collect(&graph),
    })
}

/// Summarize a document file.
pub fn cmd_inspect(
    config: &CliConfig,
    options: &Options,
    json_mode: bool,
    file: &Path,
) -> Result<(), EntwineError> {
    let text = read_document(file)?;
    let report = inspect_document(config, options, &text)?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        return Ok(());
    }

    let stats = &report.graph;
    println!("entwine Document");
    println!("================");
    println!("File:      {:?}", file);
    println!("Bytes:     {}", report.bytes);
    println!("Indices:   {}", report.declared);
    println!("Back-refs: {}", report.back_refs);
    println!();
    println!("Objects:   {}", stats.objects);
    println!("  records: {}", stats.records);
    println!("  lists:   {}", stats.lists);
    println!("  tuples:  {}", stats.tuples);
    println!("  sets:    {}", stats.sets);
    println!("  maps:    {} ({} with composite keys)", stats.maps, stats.composite_key_maps);
    println!("Shared:    {}", stats.shared);

    if !stats.tags.is_empty() {
        println!();
        println!("Types:");
        for (tag, count) in &stats.tags {
            println!("  {:<24} {}", tag, count);
        }
    }

    Ok(())
}

// =============================================================================
// ROUNDTRIP COMMAND
// =============================================================================

/// What `roundtrip` found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundtripReport {
    pub objects: usize,
    pub bytes_in: usize,
    pub bytes_out: usize,
    /// The re-encoded text is byte-identical to the input.
    pub canonical: bool,
    /// Decoding the re-encoded text gives an isomorphic graph.
    pub isomorphic: bool,
    /// Encoding the second graph reproduces the re-encoded text.
    pub stable: bool,
}

impl RoundtripReport {
    pub fn passed(&self) -> bool {
        self.isomorphic && self.stable
    }
}

/// Decode, encode, decode again and compare.
pub fn roundtrip_document(
    config: &CliConfig,
    options: &Options,
    text: &str,
) -> Result<RoundtripReport, EntwineError> {
    let (registry, first) = decode_for_reencode(config, options, text)?;
    let encoder = Encoder::new(&registry, options);
    let decoder = Decoder::new(&registry, options);

    let encoded = encoder.encode(&first.heap, &first.root)?;
    let second = decoder.decode(&encoded)?;
    let again = encoder.encode(&second.heap, &second.root)?;

    Ok(RoundtripReport {
        objects: first.heap.len(),
        bytes_in: text.len(),
        bytes_out: encoded.len(),
        canonical: encoded == text.trim_end(),
        isomorphic: isomorphic(&first.heap, &first.root, &second.heap, &second.root),
        stable: again == encoded,
    })
}

/// Verify a document file survives a round trip.
pub fn cmd_roundtrip(
    config: &CliConfig,
    options: &Options,
    json_mode: bool,
    file: &Path,
) -> Result<(), EntwineError> {
    let text = read_document(file)?;
    let report = roundtrip_document(config, options, &text)?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
    } else {
        println!("Objects:    {}", report.objects);
        println!("Bytes:      {} -> {}", report.bytes_in, report.bytes_out);
        println!("Canonical:  {}", report.canonical);
        println!("Isomorphic: {}", report.isomorphic);
        println!("Stable:     {}", report.stable);
    }

    if !report.passed() {
        return Err(EntwineError::InvalidOperation(format!(
            "round trip of {:?} is not faithful",
            file
        )));
    }
    Ok(())
}

// =============================================================================
// FMT COMMAND
// =============================================================================

/// Re-encode `text` with `options`.
pub fn reformat_document(
    config: &CliConfig,
    options: &Options,
    text: &str,
) -> Result<String, EntwineError> {
    let (registry, graph) = decode_for_reencode(config, options, text)?;
    Encoder::new(&registry, options).encode(&graph.heap, &graph.root)
}

/// Re-encode a document file.
pub fn cmd_fmt(
    config: &CliConfig,
    options: &Options,
    json_mode: bool,
    file: &Path,
    output: Option<&Path>,
) -> Result<(), EntwineError> {
    let text = read_document(file)?;
    let formatted = reformat_document(config, options, &text)?;
    tracing::debug!(bytes_in = text.len(), bytes_out = formatted.len(), "document reformatted");
    write_document(&formatted, output, json_mode)
}

// =============================================================================
// DEMO COMMAND
// =============================================================================

/// Encode the wizard scenario.
pub fn demo_document(options: &Options) -> Result<String, EntwineError> {
    let registry = demo::registry()?;
    let graph = demo::world(&registry)?;
    Encoder::new(&registry, options).encode(&graph.heap, &graph.root)
}

/// Write the wizard scenario.
pub fn cmd_demo(
    options: &Options,
    json_mode: bool,
    output: Option<&Path>,
) -> Result<(), EntwineError> {
    let text = demo_document(options)?;
    write_document(&text, output, json_mode)
}
