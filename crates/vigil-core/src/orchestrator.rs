// SPDX-License-Identifier: Apache-2.0

//! The scan orchestration pipeline.
//!
//! Given a repository URL, the orchestrator resolves a provider,
//! decides via cache and change detection whether the expensive work
//! can be skipped, and otherwise clones into an ephemeral workspace,
//! runs every registered scanner against it, aggregates the findings,
//! and records the outcome in cache and history.
//!
//! The cache and history store are the only process-wide mutable state;
//! they are injected at construction so tests build isolated instances.
//! Concurrent runs for distinct repositories share nothing else.
//! Concurrent runs for the same repository are accepted as
//! last-write-wins on the history record: cache entries are keyed by
//! commit hash, so a race costs redundant work, never inconsistent
//! content.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStats, ScanCache};
use crate::config::{AppConfig, ScanConfig};
use crate::error::VigilError;
use crate::gitcmd;
use crate::history::{
    HistoryStatistics, ScanHistoryEntry, ScanHistoryStore, ScanRecord, ScanUpdate,
};
use crate::provider::registry::ProviderRegistry;
use crate::provider::types::{
    ChangeDetection, CloneOptions, ProviderCapabilities, ProviderHealth, RepositoryReference,
    UNKNOWN_COMMIT,
};
use crate::provider::GitProvider;
use crate::report::{ScanReport, ScanStatus};
use crate::scanner::Scanner;
use crate::scanner::gitleaks::GitleaksScanner;
use crate::scanner::patterns::PatternScanner;
use crate::scanner::semgrep::SemgrepScanner;
use crate::scanner::types::ScannerReport;

/// A file excerpt around one line, for rendering findings in context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeContext {
    /// Repository-relative file path.
    pub file_path: String,
    /// Commit the content was read at.
    pub commit_hash: String,
    /// The requested line (1-indexed).
    pub line: u64,
    /// First line number of the excerpt.
    pub start_line: u64,
    /// The excerpt, one element per line.
    pub lines: Vec<String>,
}

/// Outcome of the shortcut phase: serve a skip report, or proceed to
/// the full pipeline with any comparison already computed.
enum Shortcut {
    Skip(ScanReport),
    FullScan(Option<ChangeDetection>),
}

/// The scan orchestration pipeline and its operation surface.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    cache: Arc<ScanCache<ScanReport>>,
    history: Arc<ScanHistoryStore>,
    scanners: Vec<Arc<dyn Scanner>>,
    scan_config: ScanConfig,
}

impl Orchestrator {
    /// Wires an orchestrator from explicitly constructed components.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<ScanCache<ScanReport>>,
        history: Arc<ScanHistoryStore>,
        scanners: Vec<Arc<dyn Scanner>>,
        scan_config: ScanConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            history,
            scanners,
            scan_config,
        }
    }

    /// Builds the standard wiring: default provider registry, fresh
    /// cache and history, and the built-in pattern scanner plus the
    /// semgrep and gitleaks adapters.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider HTTP client cannot be built.
    pub fn with_defaults(config: &AppConfig) -> Result<Self, VigilError> {
        let timeout = config.scan.scanner_timeout_seconds;
        let scanners: Vec<Arc<dyn Scanner>> = vec![
            Arc::new(PatternScanner::new()),
            Arc::new(SemgrepScanner::new(timeout)),
            Arc::new(GitleaksScanner::new(timeout)),
        ];

        Ok(Self::new(
            Arc::new(ProviderRegistry::with_default_providers(config)?),
            Arc::new(ScanCache::new(&config.cache)),
            Arc::new(ScanHistoryStore::new()),
            scanners,
            config.scan.clone(),
        ))
    }

    /// Starts the cache's background expiry sweeper.
    #[must_use]
    pub fn start_cache_sweeper(
        &self,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        ScanCache::spawn_sweeper(&self.cache, interval)
    }

    /// Scans a repository, honoring cache and change detection.
    ///
    /// `force` bypasses every shortcut and always performs a full scan,
    /// but still updates cache and history afterward.
    ///
    /// # Errors
    ///
    /// Terminal failures only: provider resolution, commit resolution,
    /// clone, and metadata fetch. Scanner failures degrade to empty
    /// contributions inside the report.
    #[instrument(skip(self), fields(url = %url, force))]
    pub async fn scan_repository(
        &self,
        url: &str,
        force: bool,
    ) -> Result<ScanReport, VigilError> {
        let started = Instant::now();

        // 1. Resolve provider; fail fast with no cache or history
        //    mutation when nothing matches.
        let provider = self.registry.provider_for(url)?;
        let reference = provider
            .parse_url(url)
            .ok_or_else(|| VigilError::InvalidUrl {
                url: url.to_string(),
            })?;
        debug!(provider = %provider.capabilities().name, "Resolved provider");

        // 2. Resolve the current commit. "unknown" skips every
        //    shortcut and forces the full path.
        let commit = provider.last_commit_hash(url).await?;

        let change_detection = if force {
            info!(url, "Force flag set, bypassing change detection");
            None
        } else if commit == UNKNOWN_COMMIT {
            None
        } else {
            match self.try_shortcuts(url, &provider, &commit, started).await {
                Shortcut::Skip(report) => return Ok(report),
                Shortcut::FullScan(detection) => detection,
            }
        };

        // Steps 7-12: the expensive path.
        self.full_scan(url, &provider, reference, &commit, change_detection, started)
            .await
    }

    /// Scans a repository unconditionally.
    ///
    /// # Errors
    ///
    /// Same terminal failures as [`scan_repository`].
    ///
    /// [`scan_repository`]: Orchestrator::scan_repository
    pub async fn force_scan_repository(&self, url: &str) -> Result<ScanReport, VigilError> {
        self.scan_repository(url, true).await
    }

    /// Steps 3-6: cache lookup, then the change-detection state machine.
    async fn try_shortcuts(
        &self,
        url: &str,
        provider: &Arc<dyn GitProvider>,
        commit: &str,
        started: Instant,
    ) -> Shortcut {
        // 3. Exact cache hit.
        if let Some(report) = self.cache.get(url, commit) {
            debug!(url, commit, "Cache hit");
            let report = report.served_from_cache();
            self.record_run(url, commit, &report, started, true);
            return Shortcut::Skip(report);
        }

        // 5-6. Prior record drives the state machine; no prior record
        // means FULL_SCAN.
        let Some(prior) = self.history.get_last(url) else {
            return Shortcut::FullScan(None);
        };

        if prior.last_commit_hash == commit {
            // SAME_COMMIT -> SKIP: synthesize, cache, and record so the
            // next identical request is an O(1) cache hit.
            debug!(url, commit, "Commit unchanged since last scan");
            let Some(reference) = provider.parse_url(url) else {
                return Shortcut::FullScan(None);
            };
            return Shortcut::Skip(self.synthesize_skip(url, reference, commit, None, started));
        }

        // DIFFERENT_COMMIT -> COMPARE. Comparison errors surface as
        // has_changes inside the result, so this never aborts.
        let detection = provider.changes_since(url, &prior.last_commit_hash).await;
        if detection.has_changes {
            debug!(url, prior = %prior.last_commit_hash, current = commit, "Changes detected");
            return Shortcut::FullScan(Some(detection));
        }

        // NO_SIGNIFICANT_CHANGES -> SKIP. Prefer a stale-but-valid
        // cached payload for the repository; otherwise synthesize.
        debug!(url, "No significant changes since last scan");
        if let Some(entry) = self.cache.latest_for_repo(url) {
            let report = entry.payload.served_from_cache();
            self.record_run(url, commit, &report, started, true);
            return Shortcut::Skip(report);
        }
        match provider.parse_url(url) {
            Some(reference) => Shortcut::Skip(self.synthesize_skip(
                url,
                reference,
                commit,
                Some(detection),
                started,
            )),
            None => Shortcut::FullScan(Some(detection)),
        }
    }

    /// Builds, caches, and records a synthetic "no changes" report.
    fn synthesize_skip(
        &self,
        url: &str,
        reference: RepositoryReference,
        commit: &str,
        detection: Option<ChangeDetection>,
        started: Instant,
    ) -> ScanReport {
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        let report =
            ScanReport::no_changes(reference, commit, detection, Utc::now(), duration_ms);
        self.cache.put(url, commit, report.clone());
        self.record_run(url, commit, &report, started, false);
        report
    }

    /// Steps 7-12: clone, fetch metadata, run scanners, aggregate,
    /// cache, and record.
    async fn full_scan(
        &self,
        url: &str,
        provider: &Arc<dyn GitProvider>,
        reference: RepositoryReference,
        commit: &str,
        change_detection: Option<ChangeDetection>,
        started: Instant,
    ) -> Result<ScanReport, VigilError> {
        // 7. Ephemeral workspace: the TempDir guard deletes the clone
        //    on every exit path, including errors and timeouts below.
        let workdir = tempfile::tempdir()?;
        let clone_options = CloneOptions {
            depth: self.scan_config.clone_depth,
            timeout_seconds: self.scan_config.clone_timeout_seconds,
            branch: None,
        };

        if let Err(err) = provider
            .clone_repository(url, workdir.path(), &clone_options)
            .await
        {
            self.record_failure(url, commit, started);
            return Err(err);
        }

        // An unknown head resolves to the actual cloned commit so the
        // report and cache key stay accurate.
        let commit = if commit == UNKNOWN_COMMIT {
            match gitcmd::local_head_commit(workdir.path(), clone_options.timeout_seconds).await {
                Ok(info) => info.hash,
                Err(_) => commit.to_string(),
            }
        } else {
            commit.to_string()
        };

        // 8. Metadata with the provider's API-then-git fallback chain.
        let metadata = match provider.fetch_metadata(url).await {
            Ok(metadata) => metadata,
            Err(err) => {
                self.record_failure(url, &commit, started);
                return Err(err);
            }
        };

        // 9-10. Run every scanner concurrently against the read-only
        // clone; each failure is isolated to an empty contribution.
        let runs = self.scanners.iter().map(|scanner| {
            let path = workdir.path().to_path_buf();
            async move {
                let name = scanner.name().to_string();
                match scanner.scan(&path).await {
                    Ok(findings) => {
                        let version = scanner.version().await;
                        debug!(scanner = %name, count = findings.len(), "Scanner finished");
                        ScannerReport::from_findings(&name, version, findings)
                    }
                    Err(err) => {
                        warn!(scanner = %name, error = %err, "Scanner failed, contributing empty result");
                        ScannerReport::from_error(&name, err.to_string())
                    }
                }
            }
        });
        let scanner_reports = futures::future::join_all(runs).await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        let report = ScanReport::from_scanners(
            reference,
            &commit,
            Some(metadata),
            scanner_reports,
            change_detection,
            Utc::now(),
            duration_ms,
        );

        // 11. Cache and record.
        self.cache.put(url, &commit, report.clone());
        self.record_run(url, &commit, &report, started, false);

        info!(
            url,
            commit = %report.commit_hash,
            findings = report.total_findings,
            duration_ms,
            "Scan complete"
        );
        Ok(report)
    }

    /// The exactly-once history update for a completed run.
    fn record_run(
        &self,
        url: &str,
        commit: &str,
        report: &ScanReport,
        started: Instant,
        cache_hit: bool,
    ) {
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        self.history.update(
            url,
            commit,
            &ScanUpdate {
                duration_ms: Some(duration_ms),
                status: Some(report.status),
                findings: Some(report.total_findings),
                cache_hit,
            },
        );
    }

    /// The exactly-once history update for a failed run.
    fn record_failure(&self, url: &str, commit: &str, started: Instant) {
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        self.history.update(
            url,
            commit,
            &ScanUpdate {
                duration_ms: Some(duration_ms),
                status: Some(ScanStatus::Failed),
                findings: None,
                cache_hit: false,
            },
        );
    }

    // ------------------------------------------------------------------
    // Inbound operation surface beyond scanning
    // ------------------------------------------------------------------

    /// Aggregate scan statistics across all repositories.
    #[must_use]
    pub fn scan_statistics(&self) -> HistoryStatistics {
        self.history.statistics()
    }

    /// Every repository's scan record.
    #[must_use]
    pub fn all_scan_records(&self) -> Vec<ScanRecord> {
        self.history.all_records()
    }

    /// A repository's scan history, most recent first.
    #[must_use]
    pub fn scan_history(&self, url: &str) -> Vec<ScanHistoryEntry> {
        self.history.history(url, 50)
    }

    /// Cache statistics.
    #[must_use]
    pub fn cache_statistics(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Empties the cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Removes every cache entry for a repository. Returns how many
    /// were removed.
    pub fn invalidate_repository_cache(&self, url: &str) -> usize {
        self.cache.invalidate_repository(url)
    }

    /// Capability descriptions of the registered providers.
    #[must_use]
    pub fn provider_capabilities(&self) -> Vec<ProviderCapabilities> {
        self.registry.capabilities()
    }

    /// Health probes of the registered providers.
    pub async fn provider_health(&self) -> Vec<ProviderHealth> {
        self.registry.health_report().await
    }

    /// Fetches the lines around `line` (1-indexed) of a file at the
    /// repository's current head.
    ///
    /// # Errors
    ///
    /// Fails on provider resolution, file fetch, or an out-of-range
    /// line number.
    pub async fn code_context(
        &self,
        url: &str,
        file_path: &str,
        line: u64,
        context_lines: u64,
    ) -> Result<CodeContext, VigilError> {
        let provider = self.registry.provider_for(url)?;
        let commit = provider.last_commit_hash(url).await?;
        let reference = if commit == UNKNOWN_COMMIT {
            "HEAD".to_string()
        } else {
            commit.clone()
        };

        let content = provider.fetch_file(url, file_path, &reference).await?;
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len() as u64;
        if line == 0 || line > total {
            return Err(VigilError::FileContent {
                path: file_path.to_string(),
                message: format!("line {line} out of range (file has {total} lines)"),
            });
        }

        let start_line = line.saturating_sub(context_lines).max(1);
        let end_line = (line + context_lines).min(total);
        #[allow(clippy::cast_possible_truncation)]
        let excerpt = lines[(start_line - 1) as usize..end_line as usize]
            .iter()
            .map(ToString::to_string)
            .collect();

        Ok(CodeContext {
            file_path: file_path.to_string(),
            commit_hash: commit,
            line,
            start_line,
            lines: excerpt,
        })
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_code_context_excerpt_bounds() {
        // Pure slicing logic mirrored here to pin the boundary rules;
        // the end-to-end path is covered by the integration tests.
        let content = "l1\nl2\nl3\nl4\nl5";
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len() as u64;

        let line: u64 = 2;
        let context: u64 = 2;
        let start_line = line.saturating_sub(context).max(1);
        let end_line = (line + context).min(total);
        assert_eq!(start_line, 1);
        assert_eq!(end_line, 4);
        let excerpt = &lines[(start_line - 1) as usize..end_line as usize];
        assert_eq!(excerpt, &["l1", "l2", "l3", "l4"]);
    }
}
