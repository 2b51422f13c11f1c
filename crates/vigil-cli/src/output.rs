// SPDX-License-Identifier: Apache-2.0

//! Rendering of scan results for the terminal.
//!
//! Text output uses comfy-table and console styling; `-o json` prints
//! pretty JSON for programmatic consumption.

use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use console::style;
use serde::Serialize;

use vigil_core::orchestrator::CodeContext;
use vigil_core::{
    CacheStats, HistoryStatistics, ProviderCapabilities, ProviderHealth, ScanHistoryEntry,
    ScanRecord, ScanReport, Severity,
};

use crate::cli::{OutputContext, OutputFormat};

/// Prints a value as pretty JSON.
fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("Failed to serialize output: {err}"),
    }
}

fn severity_cell(severity: Severity) -> Cell {
    Cell::new(severity.as_str())
}

/// Renders a scan report.
pub fn render_report(report: &ScanReport, ctx: &OutputContext) {
    if matches!(ctx.format, OutputFormat::Json) {
        print_json(report);
        return;
    }

    let title = format!(
        "{} @ {}",
        report.repository.full_name,
        &report.commit_hash[..report.commit_hash.len().min(12)]
    );
    println!("{}", style(title).bold());

    if report.from_cache {
        println!("{}", style("(served from cache)").dim());
    }
    if report.no_changes {
        println!("{}", style("No changes since last scan.").green());
    }

    if let Some(metadata) = &report.metadata {
        if let Some(description) = &metadata.description {
            println!("{}", style(description).dim());
        }
        println!(
            "default branch: {} | last commit: {}",
            metadata.default_branch,
            metadata.last_commit.message.as_deref().unwrap_or("-")
        );
    }

    println!(
        "findings: {} | duration: {}ms | status: {}",
        report.total_findings, report.duration_ms, report.status
    );

    for scanner in &report.scanners {
        if let Some(error) = &scanner.error {
            println!(
                "  {} {}",
                style(format!("{}:", scanner.scanner)).yellow(),
                style(format!("failed ({error})")).dim()
            );
            continue;
        }
        println!(
            "  {} {} finding(s)",
            style(format!("{}:", scanner.scanner)).cyan(),
            scanner.findings.len()
        );
    }

    let findings: Vec<_> = report
        .scanners
        .iter()
        .flat_map(|scanner| scanner.findings.iter())
        .collect();
    if findings.is_empty() || ctx.quiet {
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(["severity", "rule", "location", "scanner", "message"]);
    for finding in findings {
        let location = if finding.file_path.is_empty() {
            "-".to_string()
        } else {
            format!("{}:{}", finding.file_path, finding.line)
        };
        table.add_row(vec![
            severity_cell(finding.severity),
            Cell::new(&finding.rule_id),
            Cell::new(location),
            Cell::new(&finding.scanner),
            Cell::new(&finding.message),
        ]);
    }
    println!("{table}");
}

/// Renders a repository's scan history.
pub fn render_history(url: &str, entries: &[ScanHistoryEntry], ctx: &OutputContext) {
    if matches!(ctx.format, OutputFormat::Json) {
        print_json(&entries);
        return;
    }

    if entries.is_empty() {
        println!("No scan history for {url}");
        return;
    }

    println!("{}", style(format!("Scan history for {url}")).bold());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(["when", "commit", "status", "findings", "duration", "cache"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(&entry.commit_hash[..entry.commit_hash.len().min(12)]),
            Cell::new(entry.status.as_str()),
            Cell::new(entry.findings),
            Cell::new(format!("{}ms", entry.duration_ms)),
            Cell::new(if entry.cache_hit { "hit" } else { "-" }),
        ]);
    }
    println!("{table}");
}

/// Renders all scan records.
pub fn render_records(records: &[ScanRecord], ctx: &OutputContext) {
    if matches!(ctx.format, OutputFormat::Json) {
        print_json(&records);
        return;
    }

    if records.is_empty() {
        println!("No repositories scanned yet.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(["repository", "last commit", "scans", "cache hits", "last status"]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.repo_url),
            Cell::new(&record.last_commit_hash[..record.last_commit_hash.len().min(12)]),
            Cell::new(record.scan_count),
            Cell::new(record.cache_hit_count),
            Cell::new(
                record
                    .last_scan_status
                    .map_or("-", vigil_core::ScanStatus::as_str),
            ),
        ]);
    }
    println!("{table}");
}

/// Renders aggregate scan statistics.
pub fn render_stats(stats: &HistoryStatistics, ctx: &OutputContext) {
    if matches!(ctx.format, OutputFormat::Json) {
        print_json(stats);
        return;
    }

    println!("{}", style("Scan statistics").bold());
    println!("repositories:      {}", stats.total_repositories);
    println!("total scans:       {}", stats.total_scans);
    println!("cache hits:        {}", stats.total_cache_hits);
    println!("current findings:  {}", stats.total_findings);
    println!("avg duration:      {:.0}ms", stats.average_scan_duration_ms);
}

/// Renders cache statistics.
pub fn render_cache_stats(stats: &CacheStats, ctx: &OutputContext) {
    if matches!(ctx.format, OutputFormat::Json) {
        print_json(stats);
        return;
    }

    println!("{}", style("Cache statistics").bold());
    println!("entries: {}", stats.total_entries);
    if let Some(oldest) = stats.oldest {
        println!("oldest:  {}", oldest.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(newest) = stats.newest {
        println!("newest:  {}", newest.format("%Y-%m-%d %H:%M:%S"));
    }
}

/// Renders provider capabilities, with optional health probes.
pub fn render_providers(
    capabilities: &[ProviderCapabilities],
    health: Option<&[ProviderHealth]>,
    ctx: &OutputContext,
) {
    if matches!(ctx.format, OutputFormat::Json) {
        #[derive(Serialize)]
        struct Providers<'a> {
            capabilities: &'a [ProviderCapabilities],
            #[serde(skip_serializing_if = "Option::is_none")]
            health: Option<&'a [ProviderHealth]>,
        }
        print_json(&Providers {
            capabilities,
            health,
        });
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(["provider", "platform", "hosts", "api", "auth"]);
    for capability in capabilities {
        table.add_row(vec![
            Cell::new(&capability.name),
            Cell::new(capability.platform.as_str()),
            Cell::new(if capability.hostnames.is_empty() {
                "(any)".to_string()
            } else {
                capability.hostnames.join(", ")
            }),
            Cell::new(if capability.supports_api { "yes" } else { "no" }),
            Cell::new(format!("{:?}", capability.auth_kind).to_lowercase()),
        ]);
    }
    println!("{table}");

    if let Some(probes) = health {
        println!();
        for probe in probes {
            let status = if probe.is_healthy {
                style("healthy").green()
            } else {
                style("unreachable").red()
            };
            let auth = match probe.auth_valid {
                Some(true) => ", auth ok",
                Some(false) => ", auth invalid",
                None => "",
            };
            println!(
                "  {}: {} ({}ms{auth})",
                probe.name, status, probe.response_time_ms
            );
        }
    }
}

/// Renders a code-context excerpt.
pub fn render_context(context: &CodeContext, ctx: &OutputContext) {
    if matches!(ctx.format, OutputFormat::Json) {
        print_json(context);
        return;
    }

    println!(
        "{}",
        style(format!(
            "{} @ {}",
            context.file_path,
            &context.commit_hash[..context.commit_hash.len().min(12)]
        ))
        .bold()
    );
    for (offset, line) in context.lines.iter().enumerate() {
        let number = context.start_line + offset as u64;
        if number == context.line {
            println!("{}", style(format!("{number:>6} | {line}")).yellow().bold());
        } else {
            println!("{number:>6} | {line}");
        }
    }
}
