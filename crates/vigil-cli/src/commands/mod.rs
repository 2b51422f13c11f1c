// SPDX-License-Identifier: Apache-2.0

//! Command handlers for the Vigil CLI.

pub mod cache;
pub mod context;
pub mod history;
pub mod scan;

use anyhow::Result;
use clap::CommandFactory;

use crate::cli::{CacheCommand, Cli, Commands, CompletionCommand, OutputContext};
use crate::output;
use vigil_core::Orchestrator;

/// Dispatch to the appropriate command handler.
pub async fn run(
    command: Commands,
    ctx: OutputContext,
    orchestrator: &Orchestrator,
) -> Result<()> {
    match command {
        Commands::Scan { url, force } => scan::run(orchestrator, &url, force, ctx).await,

        Commands::History { url, limit } => {
            history::run_history(orchestrator, &url, limit, ctx);
            Ok(())
        }

        Commands::Records => {
            history::run_records(orchestrator, ctx);
            Ok(())
        }

        Commands::Stats => {
            history::run_stats(orchestrator, ctx);
            Ok(())
        }

        Commands::Cache(cache_cmd) => {
            match cache_cmd {
                CacheCommand::Stats => cache::run_stats(orchestrator, ctx),
                CacheCommand::Clear => cache::run_clear(orchestrator, ctx),
                CacheCommand::Invalidate { url } => {
                    cache::run_invalidate(orchestrator, &url, ctx);
                }
            }
            Ok(())
        }

        Commands::Providers { health } => {
            let capabilities = orchestrator.provider_capabilities();
            let probes = if health {
                Some(orchestrator.provider_health().await)
            } else {
                None
            };
            output::render_providers(&capabilities, probes.as_deref(), &ctx);
            Ok(())
        }

        Commands::Context {
            url,
            file,
            line,
            context,
        } => context::run(orchestrator, &url, &file, line, context, ctx).await,

        Commands::Completion(CompletionCommand::Generate { shell }) => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "vigil", &mut std::io::stdout());
            Ok(())
        }
    }
}
