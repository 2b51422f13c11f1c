// SPDX-License-Identifier: Apache-2.0

//! The `vigil scan` command.

use anyhow::Result;

use crate::cli::OutputContext;
use crate::output;
use vigil_core::Orchestrator;

/// Scans a repository and renders the report.
pub async fn run(
    orchestrator: &Orchestrator,
    url: &str,
    force: bool,
    ctx: OutputContext,
) -> Result<()> {
    let report = orchestrator.scan_repository(url, force).await?;
    output::render_report(&report, &ctx);
    Ok(())
}
