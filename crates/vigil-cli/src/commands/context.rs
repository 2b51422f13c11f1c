// SPDX-License-Identifier: Apache-2.0

//! The `vigil context` command.

use anyhow::Result;

use crate::cli::OutputContext;
use crate::output;
use vigil_core::Orchestrator;

/// Fetches and renders the lines around a finding location.
pub async fn run(
    orchestrator: &Orchestrator,
    url: &str,
    file: &str,
    line: u64,
    context_lines: u64,
    ctx: OutputContext,
) -> Result<()> {
    let context = orchestrator
        .code_context(url, file, line, context_lines)
        .await?;
    output::render_context(&context, &ctx);
    Ok(())
}
