// SPDX-License-Identifier: Apache-2.0

//! Vigil - repository security scan orchestration.
//!
//! A CLI over the vigil-core orchestrator: scan repositories, inspect
//! history and statistics, and manage the result cache.

mod cli;
mod commands;
mod errors;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use crate::cli::{Cli, OutputContext};
use vigil_core::{Orchestrator, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let output_ctx = OutputContext::from_cli(cli.output, cli.quiet);

    let config = load_config().context("Failed to load configuration")?;
    debug!("Configuration loaded successfully");

    let orchestrator =
        Orchestrator::with_defaults(&config).context("Failed to initialize orchestrator")?;
    let _sweeper = orchestrator.start_cache_sweeper(std::time::Duration::from_secs(
        config.cache.sweep_interval_seconds,
    ));

    match commands::run(cli.command, output_ctx, &orchestrator).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let formatted = errors::format_error(&e);
            eprintln!("Error: {formatted}");
            std::process::exit(1);
        }
    }
}
