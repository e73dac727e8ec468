//! Integration tests for the CLI commands.

use entwine::cli::{
    self, Cli, CliConfig, cmd_demo, cmd_fmt, cmd_inspect, demo_document, inspect_document,
    reformat_document, roundtrip_document,
};
use clap::Parser;
use entwine_core::{EntwineError, Options};
use std::ffi::OsString;
use std::fs;

const CONFIG: &str = r#"
[options]
indent = 2

[[types]]
tag = "doc.Node"
fields = ["label", "next"]
"#;

const CYCLE: &str = r#"{"$id":0,"$type":"doc.Node","label":"a","next":{"$id":1,"$type":"doc.Node","label":"b","next":{"$ref":0}}}"#;

fn config() -> CliConfig {
    CliConfig::parse(CONFIG).expect("config")
}

// =============================================================================
// INSPECT
// =============================================================================

#[test]
fn inspect_counts_indices_and_back_refs() {
    let config = config();
    let report = inspect_document(&config, &Options::default(), CYCLE).expect("inspect");
    assert_eq!(report.declared, 2);
    assert_eq!(report.back_refs, 1);
    assert_eq!(report.graph.records, 2);
    assert_eq!(report.graph.tags.get("doc.Node"), Some(&2));
    // node a is both the root and the target of b.next
    assert_eq!(report.graph.shared, 1);
}

#[test]
fn inspect_unknown_tag_needs_lenient() {
    let empty = CliConfig::default();
    assert!(matches!(
        inspect_document(&empty, &Options::default(), CYCLE),
        Err(EntwineError::UnknownTypeTag { .. })
    ));
    let report = inspect_document(&empty, &Options::lenient(), CYCLE).expect("inspect");
    assert_eq!(report.graph.objects, 2);
}

#[test]
fn inspect_command_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cycle.json");
    fs::write(&path, CYCLE).expect("write");

    cmd_inspect(&config(), &Options::default(), true, &path).expect("inspect");
    assert!(matches!(
        cmd_inspect(&config(), &Options::default(), true, &dir.path().join("missing.json")),
        Err(EntwineError::IoError(_))
    ));
    assert!(matches!(
        cmd_inspect(&config(), &Options::default(), true, dir.path()),
        Err(EntwineError::IoError(_))
    ));
}

// =============================================================================
// ROUNDTRIP
// =============================================================================

#[test]
fn roundtrip_of_canonical_text_passes() {
    let report =
        roundtrip_document(&config(), &Options::default(), CYCLE).expect("roundtrip");
    assert!(report.passed());
    assert!(report.canonical);
    assert_eq!(report.objects, 2);
}

#[test]
fn roundtrip_of_spaced_text_is_not_canonical() {
    let spaced = CYCLE.replace(',', ", ");
    let report =
        roundtrip_document(&config(), &Options::default(), &spaced).expect("roundtrip");
    assert!(report.passed());
    assert!(!report.canonical);
}

#[test]
fn roundtrip_of_demo_passes() {
    let options = Options::default();
    let text = demo_document(&options).expect("demo");
    let report = roundtrip_document(&CliConfig::default(), &Options::lenient(), &text)
        .expect("roundtrip");
    assert!(report.passed());
    assert!(report.canonical);
}

// =============================================================================
// FMT
// =============================================================================

#[test]
fn fmt_lenient_keeps_unknown_tags() {
    let formatted =
        reformat_document(&CliConfig::default(), &Options::lenient(), CYCLE).expect("fmt");
    assert_eq!(formatted, CYCLE);
}

#[test]
fn fmt_applies_options() {
    let options = Options {
        make_refs: false,
        ..Options::default()
    };
    let formatted = reformat_document(&config(), &options, CYCLE).expect("fmt");
    assert_eq!(
        formatted,
        r#"{"$type":"doc.Node","label":"a","next":{"$type":"doc.Node","label":"b","next":null}}"#
    );
}

#[test]
fn fmt_writes_output_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.json");
    let output = dir.path().join("out.json");
    fs::write(&input, CYCLE).expect("write");

    let config = config();
    cmd_fmt(&config, &config.options, false, &input, Some(output.as_path())).expect("fmt");
    let written = fs::read_to_string(&output).expect("read");
    assert!(written.contains("\n  \"$id\": 0"));
    assert_eq!(
        reformat_document(&config, &Options::default(), &written).expect("fmt"),
        CYCLE
    );
}

#[test]
fn fmt_rejects_missing_output_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.json");
    fs::write(&input, CYCLE).expect("write");
    let output = dir.path().join("nope").join("out.json");

    assert!(matches!(
        cmd_fmt(&config(), &Options::default(), false, &input, Some(output.as_path())),
        Err(EntwineError::IoError(_))
    ));
}

// =============================================================================
// DEMO AND EXECUTE
// =============================================================================

#[test]
fn demo_writes_decodable_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("wizards.json");
    cmd_demo(&Options::default(), true, Some(output.as_path())).expect("demo");

    let text = fs::read_to_string(&output).expect("read");
    assert!(text.contains("\"$entries\""));
    let report = inspect_document(&CliConfig::default(), &Options::lenient(), &text)
        .expect("inspect");
    assert_eq!(report.graph.tags.get("wizard.Wizard"), Some(&3));
    assert_eq!(report.graph.composite_key_maps, 2);
}

#[test]
fn execute_loads_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("entwine.toml");
    let input = dir.path().join("in.json");
    let output = dir.path().join("out.json");
    fs::write(&config_path, CONFIG).expect("write");
    fs::write(&input, CYCLE).expect("write");

    let cli = Cli::try_parse_from([
        OsString::from("entwine"),
        OsString::from("fmt"),
        OsString::from("--config"),
        config_path.into_os_string(),
        OsString::from("-f"),
        input.into_os_string(),
        OsString::from("-o"),
        output.clone().into_os_string(),
        OsString::from("--sort-fields"),
    ])
    .expect("parse");
    cli::execute(cli).expect("execute");

    let written = fs::read_to_string(&output).expect("read");
    assert!(written.starts_with("{\n  \"$id\": 0"));
}

#[test]
fn execute_rejects_bad_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("entwine.toml");
    fs::write(&config_path, "[options]\nindent = 99\n").expect("write");

    let cli = Cli::try_parse_from([
        OsString::from("entwine"),
        OsString::from("demo"),
        OsString::from("--config"),
        config_path.into_os_string(),
    ])
    .expect("parse");
    assert!(matches!(
        cli::execute(cli),
        Err(EntwineError::InvalidConfig(_))
    ));
}
