//! # entwine CLI Module
//!
//! ## Available Commands
//!
//! - `inspect` - Summarize the graph a document describes
//! - `roundtrip` - Verify a document decodes and re-encodes stably
//! - `fmt` - Re-encode a document with the selected options
//! - `demo` - Encode the bundled wizard scenario

mod commands;
mod config;
mod stats;

use clap::{Args, Parser, Subcommand};
use entwine_core::{EntwineError, Options};
use std::path::PathBuf;

pub use commands::*;
pub use config::{CliConfig, TypeSpec, adopt_tags};
pub use stats::{GraphStats, count_back_refs};

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// entwine - reference-preserving JSON for object graphs
///
/// Cycles, shared objects and composite mapping keys survive the trip
/// through text.
#[derive(Parser, Debug)]
#[command(name = "entwine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML file with codec options and registered types
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(flatten)]
    pub codec: CodecFlags,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Command-line overrides for the codec options.
///
/// Anything left unset keeps the value from the config file (or the
/// library default).
#[derive(Args, Debug, Default, Clone)]
pub struct CodecFlags {
    /// Decode unknown type tags as generic records instead of failing
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Maximum composite nesting depth
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Pretty-print output with this indentation width
    #[arg(long, global = true)]
    pub indent: Option<usize>,

    /// Do not emit reference indices (cycles become null)
    #[arg(long, global = true)]
    pub no_refs: bool,

    /// Do not emit type tags (records become plain mappings)
    #[arg(long, global = true)]
    pub no_type_tags: bool,

    /// Emit record fields sorted by name
    #[arg(long, global = true)]
    pub sort_fields: bool,

    /// Stringify scalar keys and reject composite keys
    #[arg(long, global = true)]
    pub no_composite_keys: bool,
}

impl CodecFlags {
    /// Layer the flags over `options` and validate the result.
    pub fn apply(&self, mut options: Options) -> Result<Options, EntwineError> {
        if self.lenient {
            options.strict_types = false;
        }
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        if self.indent.is_some() {
            options.indent = self.indent;
        }
        if self.no_refs {
            options.make_refs = false;
        }
        if self.no_type_tags {
            options.embed_type_tags = false;
        }
        if self.sort_fields {
            options.deterministic_order = true;
        }
        if self.no_composite_keys {
            options.encode_composite_keys = false;
        }
        options.validate()?;
        Ok(options)
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize the graph a document describes
    Inspect {
        /// Path to the document
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Decode, re-encode and decode again, checking the graphs match
    Roundtrip {
        /// Path to the document
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Re-encode a document with the selected options
    Fmt {
        /// Path to the document
        #[arg(short, long)]
        file: PathBuf,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode the bundled wizard scenario
    Demo {
        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), EntwineError> {
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let options = cli.codec.apply(config.options.clone())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Inspect { file } => cmd_inspect(&config, &options, json_mode, &file),
        Commands::Roundtrip { file } => cmd_roundtrip(&config, &options, json_mode, &file),
        Commands::Fmt { file, output } => {
            cmd_fmt(&config, &options, json_mode, &file, output.as_deref())
        }
        Commands::Demo { output } => cmd_demo(&options, json_mode, output.as_deref()),
    }
}
