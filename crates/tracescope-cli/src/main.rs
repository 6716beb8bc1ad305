//! CLI tool for EVM call trace normalization and storage slot classification
//!
//! This binary provides the `tracescope` command-line interface for building
//! normalized trace responses, classifying touched storage slots, and showing
//! where a layout places its variables.

use anyhow::Result;
use clap::Parser;
use tracing::error;

mod cli;
mod commands;
mod config;
mod formatters;

use cli::{Cli, Commands};
use commands::{cmd_layout, cmd_storage, cmd_trace, TraceRequest};
use config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the JSON response
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = CliConfig::load_optional(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Trace {
            txhash,
            input,
            chain,
            rpc_url,
            preimages,
            registry,
            max_depth,
            output,
            format,
        } => {
            let request = TraceRequest {
                txhash: &txhash,
                chain: &chain,
                input: input.as_deref(),
                rpc_url: rpc_url.as_deref(),
                preimages: preimages.as_deref(),
                registry: registry.as_deref(),
                max_depth,
                output: output.as_deref(),
                format,
            };
            cmd_trace(request, &config).await
        }

        Commands::Storage {
            layout,
            slots,
            slots_file,
            preimages,
            output,
            format,
        } => cmd_storage(
            &layout,
            &slots,
            slots_file.as_deref(),
            preimages.as_deref(),
            output.as_deref(),
            format,
        ),

        Commands::Layout {
            layout,
            output,
            format,
        } => cmd_layout(&layout, output.as_deref(), format),
    };

    if let Err(err) = &result {
        error!("Failed: {:#}", err);
    }
    result
}
