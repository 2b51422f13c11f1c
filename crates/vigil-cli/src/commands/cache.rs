// SPDX-License-Identifier: Apache-2.0

//! The `vigil cache` subcommands.

use crate::cli::{OutputContext, OutputFormat};
use crate::output;
use vigil_core::Orchestrator;

/// Shows cache statistics.
pub fn run_stats(orchestrator: &Orchestrator, ctx: OutputContext) {
    let stats = orchestrator.cache_statistics();
    output::render_cache_stats(&stats, &ctx);
}

/// Empties the cache.
pub fn run_clear(orchestrator: &Orchestrator, ctx: OutputContext) {
    orchestrator.clear_cache();
    if !matches!(ctx.format, OutputFormat::Json) {
        println!("Cache cleared.");
    }
}

/// Removes every cache entry for one repository.
pub fn run_invalidate(orchestrator: &Orchestrator, url: &str, ctx: OutputContext) {
    let removed = orchestrator.invalidate_repository_cache(url);
    if matches!(ctx.format, OutputFormat::Json) {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("Removed {removed} cache entr{}.", if removed == 1 { "y" } else { "ies" });
    }
}
