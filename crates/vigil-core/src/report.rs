// SPDX-License-Identifier: Apache-2.0

//! Aggregated scan reports.
//!
//! A [`ScanReport`] is the orchestrator's output for one run: repository
//! metadata, per-scanner findings, the severity breakdown, and the
//! change-detection context that produced it. Reports are ephemeral
//! except when captured as cache payloads.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::types::{ChangeDetection, RepositoryMetadata, RepositoryReference};
use crate::scanner::types::{Finding, ScannerReport, Severity, count_by_severity};

/// Outcome of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Full scan completed (scanner-level failures included).
    Success,
    /// Pipeline aborted before a report could be produced.
    Failed,
    /// Result served from cache or synthesized without scanning.
    Cached,
}

impl ScanStatus {
    /// Lowercase label for logs and history rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Success => "success",
            ScanStatus::Failed => "failed",
            ScanStatus::Cached => "cached",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The aggregated result of one scan orchestration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// The scanned repository.
    pub repository: RepositoryReference,
    /// Commit the report describes.
    pub commit_hash: String,
    /// Repository metadata, when a fetch succeeded this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RepositoryMetadata>,
    /// Per-scanner contributions.
    pub scanners: Vec<ScannerReport>,
    /// Total findings across all scanners.
    pub total_findings: usize,
    /// Aggregate finding counts grouped by severity.
    pub severity_breakdown: HashMap<Severity, usize>,
    /// Change-detection context, when a comparison ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_detection: Option<ChangeDetection>,
    /// Whether this report was served from cache rather than computed.
    pub from_cache: bool,
    /// Whether this is a synthesized "no changes" report.
    pub no_changes: bool,
    /// Outcome of the run.
    pub status: ScanStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
}

impl ScanReport {
    /// Assembles a full-scan report from scanner contributions.
    #[must_use]
    pub fn from_scanners(
        repository: RepositoryReference,
        commit_hash: &str,
        metadata: Option<RepositoryMetadata>,
        scanners: Vec<ScannerReport>,
        change_detection: Option<ChangeDetection>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let all_findings: Vec<&Finding> = scanners
            .iter()
            .flat_map(|report| report.findings.iter())
            .collect();
        let mut severity_breakdown = HashMap::new();
        for finding in &all_findings {
            *severity_breakdown.entry(finding.severity).or_insert(0) += 1;
        }

        Self {
            repository,
            commit_hash: commit_hash.to_string(),
            metadata,
            total_findings: all_findings.len(),
            severity_breakdown,
            scanners,
            change_detection,
            from_cache: false,
            no_changes: false,
            status: ScanStatus::Success,
            started_at,
            duration_ms,
        }
    }

    /// Synthesizes a "no changes" report.
    ///
    /// Skip results are structured like full reports: a single
    /// informational finding from the synthetic `change-detection`
    /// scanner, so they cache and render identically.
    #[must_use]
    pub fn no_changes(
        repository: RepositoryReference,
        commit_hash: &str,
        change_detection: Option<ChangeDetection>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        let finding = Finding {
            rule_id: "no-changes".to_string(),
            message: format!(
                "Repository unchanged since last scan at commit {commit_hash}; scan skipped"
            ),
            file_path: String::new(),
            line: 0,
            severity: Severity::Info,
            scanner: "change-detection".to_string(),
            extra: HashMap::new(),
        };
        let severity_breakdown = count_by_severity(std::slice::from_ref(&finding));
        let scanner_report =
            ScannerReport::from_findings("change-detection", None, vec![finding]);

        Self {
            repository,
            commit_hash: commit_hash.to_string(),
            metadata: None,
            total_findings: 1,
            severity_breakdown,
            scanners: vec![scanner_report],
            change_detection,
            from_cache: false,
            no_changes: true,
            status: ScanStatus::Cached,
            started_at,
            duration_ms,
        }
    }

    /// Marks the report as served from cache.
    #[must_use]
    pub fn served_from_cache(mut self) -> Self {
        self.from_cache = true;
        self.status = ScanStatus::Cached;
        self
    }
}
