//! Command-line interface definitions for the tracescope CLI tool
//!
//! This module contains all the clap-related structures for argument parsing
//! and command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON
    #[value(name = "pretty")]
    Pretty,
    /// Single-line JSON
    #[value(name = "json")]
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Pretty
    }
}

#[derive(Parser)]
#[command(name = "tracescope")]
#[command(about = "Normalized EVM call traces and storage slot classification")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// TOML config file with chain endpoints and defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a normalized trace response for a transaction
    Trace {
        /// Transaction hash
        #[arg(value_name = "TXHASH")]
        txhash: String,

        /// Raw callTracer output to use instead of querying a node
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Chain the transaction was executed on
        #[arg(long, default_value = "ethereum")]
        chain: String,

        /// JSON-RPC endpoint (overrides the config file)
        #[arg(long)]
        rpc_url: Option<String>,

        /// JSON file of known keccak preimages (hash -> preimage)
        #[arg(long)]
        preimages: Option<PathBuf>,

        /// JSON contract registry (overrides the config file)
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Maximum call depth, the root call being depth 1
        #[arg(long)]
        max_depth: Option<usize>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "pretty", value_enum)]
        format: OutputFormat,
    },

    /// Classify touched storage slots against a contract layout
    Storage {
        /// Contract layout file
        #[arg(value_name = "LAYOUT_FILE")]
        layout: PathBuf,

        /// Touched slot, hex or decimal (repeatable)
        #[arg(short, long = "slot", value_name = "SLOT")]
        slots: Vec<String>,

        /// JSON file with a list of touched slots
        #[arg(long)]
        slots_file: Option<PathBuf>,

        /// JSON file of known keccak preimages, or a trace response carrying them
        #[arg(long)]
        preimages: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "pretty", value_enum)]
        format: OutputFormat,
    },

    /// Show the slot assigned to each declared variable of a layout
    Layout {
        /// Contract layout file
        #[arg(value_name = "LAYOUT_FILE")]
        layout: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "pretty", value_enum)]
        format: OutputFormat,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_storage_slots() {
        let cli = Cli::parse_from([
            "tracescope",
            "storage",
            "layout.json",
            "--slot",
            "0x0",
            "-s",
            "5",
            "--format",
            "json",
        ]);
        match cli.command {
            Commands::Storage { slots, format, .. } => {
                assert_eq!(slots, vec!["0x0", "5"]);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("Expected storage command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["tracescope", "layout", "layout.json", "--config", "ts.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("ts.toml")));
        assert!(!cli.verbose);
    }
}
