//! # entwine
//!
//! Command-line tool for reference-preserving JSON documents.
//!
//! ## Usage
//!
//! ```bash
//! # Summarize a document: object kinds, shared objects, back-references
//! entwine inspect -f graph.json
//!
//! # Decode, re-encode and decode again; fail unless the result is stable
//! entwine roundtrip -f graph.json --config types.toml
//!
//! # Re-encode with different options
//! entwine fmt -f graph.json --indent 2 --sort-fields -o pretty.json
//!
//! # Write the bundled wizard scenario
//! entwine demo -o wizards.json
//! ```
//!
//! Set `ENTWINE_LOG_FORMAT=json` for machine-parseable logs and `RUST_LOG`
//! to change the filter. Logs go to stderr; documents go to stdout.

use clap::Parser;
use entwine::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let log_format = std::env::var("ENTWINE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "entwine=info,entwine_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
