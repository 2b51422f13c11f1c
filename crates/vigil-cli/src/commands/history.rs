// SPDX-License-Identifier: Apache-2.0

//! The `vigil history`, `vigil records`, and `vigil stats` commands.

use crate::cli::OutputContext;
use crate::output;
use vigil_core::Orchestrator;

/// Shows a repository's scan history.
pub fn run_history(orchestrator: &Orchestrator, url: &str, limit: usize, ctx: OutputContext) {
    let mut entries = orchestrator.scan_history(url);
    entries.truncate(limit);
    output::render_history(url, &entries, &ctx);
}

/// Lists every repository's scan record.
pub fn run_records(orchestrator: &Orchestrator, ctx: OutputContext) {
    let records = orchestrator.all_scan_records();
    output::render_records(&records, &ctx);
}

/// Shows aggregate scan statistics.
pub fn run_stats(orchestrator: &Orchestrator, ctx: OutputContext) {
    let stats = orchestrator.scan_statistics();
    output::render_stats(&stats, &ctx);
}
