// SPDX-License-Identifier: Apache-2.0

//! In-memory per-repository scan history.
//!
//! One [`ScanRecord`] per repository, updated exactly once per
//! orchestration run, plus a rolling log of the most recent 50 runs
//! (FIFO bound, not a TTL). Records are never deleted except by an
//! explicit clear.
//!
//! Like the cache, the store is process-wide shared state with interior
//! synchronization, passed by `Arc` into the orchestrator. Updates for
//! one repository across concurrent runs are last-write-wins; each
//! individual update is atomic under the lock.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::report::ScanStatus;

/// Maximum history entries retained per repository.
const HISTORY_LIMIT: usize = 50;

/// Per-repository scan bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Repository URL the record tracks.
    pub repo_url: String,
    /// Commit hash seen by the most recent run.
    pub last_commit_hash: String,
    /// When the most recent run finished.
    pub last_scan_timestamp: DateTime<Utc>,
    /// Total orchestration runs, incremented unconditionally.
    pub scan_count: u64,
    /// Duration of the most recent run in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan_duration_ms: Option<u64>,
    /// Outcome of the most recent run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan_status: Option<ScanStatus>,
    /// Finding count of the most recent run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan_findings: Option<usize>,
    /// Runs served from cache, incremented only on cache hits.
    pub cache_hit_count: u64,
}

/// One run in a repository's rolling history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanHistoryEntry {
    /// Commit the run saw.
    pub commit_hash: String,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
    /// Run outcome.
    pub status: ScanStatus,
    /// Finding count.
    pub findings: usize,
    /// Whether the result came from cache.
    pub cache_hit: bool,
}

/// The per-run delta applied by [`ScanHistoryStore::update`].
#[derive(Debug, Clone, Default)]
pub struct ScanUpdate {
    /// Run duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Run outcome.
    pub status: Option<ScanStatus>,
    /// Finding count.
    pub findings: Option<usize>,
    /// Whether the result came from cache.
    pub cache_hit: bool,
}

/// Aggregate statistics across all tracked repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStatistics {
    /// Repositories with at least one record.
    pub total_repositories: usize,
    /// Orchestration runs across all repositories.
    pub total_scans: u64,
    /// Cache hits across all repositories.
    pub total_cache_hits: u64,
    /// Findings reported by the most recent run of each repository.
    pub total_findings: usize,
    /// Mean run duration in milliseconds across the retained history.
    pub average_scan_duration_ms: f64,
}

#[derive(Debug, Default)]
struct RepoHistory {
    record: Option<ScanRecord>,
    entries: VecDeque<ScanHistoryEntry>,
}

/// In-memory scan history store.
#[derive(Debug, Default)]
pub struct ScanHistoryStore {
    repositories: RwLock<HashMap<String, RepoHistory>>,
}

impl ScanHistoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for a repository, if any run has been recorded.
    #[must_use]
    pub fn get_last(&self, repo_url: &str) -> Option<ScanRecord> {
        self.repositories
            .read()
            .expect("history lock poisoned")
            .get(repo_url)
            .and_then(|history| history.record.clone())
    }

    /// Records one orchestration run.
    ///
    /// Called exactly once per run regardless of outcome: `scan_count`
    /// increments unconditionally, `cache_hit_count` only when the run
    /// was served from cache. The history log is appended and truncated
    /// to the most recent 50 entries, oldest dropped first.
    pub fn update(&self, repo_url: &str, commit_hash: &str, update: &ScanUpdate) {
        let now = Utc::now();
        let mut repositories = self.repositories.write().expect("history lock poisoned");
        let history = repositories.entry(repo_url.to_string()).or_default();

        let (scan_count, cache_hit_count) = match &history.record {
            Some(record) => (
                record.scan_count + 1,
                record.cache_hit_count + u64::from(update.cache_hit),
            ),
            None => (1, u64::from(update.cache_hit)),
        };

        history.record = Some(ScanRecord {
            repo_url: repo_url.to_string(),
            last_commit_hash: commit_hash.to_string(),
            last_scan_timestamp: now,
            scan_count,
            last_scan_duration_ms: update.duration_ms,
            last_scan_status: update.status,
            last_scan_findings: update.findings,
            cache_hit_count,
        });

        history.entries.push_back(ScanHistoryEntry {
            commit_hash: commit_hash.to_string(),
            timestamp: now,
            duration_ms: update.duration_ms.unwrap_or(0),
            status: update.status.unwrap_or(ScanStatus::Success),
            findings: update.findings.unwrap_or(0),
            cache_hit: update.cache_hit,
        });
        while history.entries.len() > HISTORY_LIMIT {
            history.entries.pop_front();
        }
    }

    /// A repository's history, most recent first, truncated to `limit`.
    #[must_use]
    pub fn history(&self, repo_url: &str, limit: usize) -> Vec<ScanHistoryEntry> {
        self.repositories
            .read()
            .expect("history lock poisoned")
            .get(repo_url)
            .map(|history| {
                history
                    .entries
                    .iter()
                    .rev()
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All scan records, unordered.
    #[must_use]
    pub fn all_records(&self) -> Vec<ScanRecord> {
        self.repositories
            .read()
            .expect("history lock poisoned")
            .values()
            .filter_map(|history| history.record.clone())
            .collect()
    }

    /// Records whose last scan is older than `max_age_hours`.
    #[must_use]
    pub fn stale(&self, max_age_hours: i64) -> Vec<ScanRecord> {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        self.all_records()
            .into_iter()
            .filter(|record| record.last_scan_timestamp < cutoff)
            .collect()
    }

    /// Aggregate statistics across all repositories.
    #[must_use]
    pub fn statistics(&self) -> HistoryStatistics {
        let repositories = self.repositories.read().expect("history lock poisoned");

        let records: Vec<&ScanRecord> = repositories
            .values()
            .filter_map(|history| history.record.as_ref())
            .collect();
        let durations: Vec<u64> = repositories
            .values()
            .flat_map(|history| history.entries.iter().map(|entry| entry.duration_ms))
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let average_scan_duration_ms = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<u64>() as f64 / durations.len() as f64
        };

        HistoryStatistics {
            total_repositories: records.len(),
            total_scans: records.iter().map(|record| record.scan_count).sum(),
            total_cache_hits: records.iter().map(|record| record.cache_hit_count).sum(),
            total_findings: records
                .iter()
                .filter_map(|record| record.last_scan_findings)
                .sum(),
            average_scan_duration_ms,
        }
    }

    /// Removes every record and history entry.
    pub fn clear(&self) {
        self.repositories
            .write()
            .expect("history lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_update(duration_ms: u64, findings: usize) -> ScanUpdate {
        ScanUpdate {
            duration_ms: Some(duration_ms),
            status: Some(ScanStatus::Success),
            findings: Some(findings),
            cache_hit: false,
        }
    }

    #[test]
    fn test_first_update_creates_record() {
        let store = ScanHistoryStore::new();
        assert!(store.get_last("url").is_none());

        store.update("url", "c1", &success_update(1200, 3));

        let record = store.get_last("url").expect("record");
        assert_eq!(record.scan_count, 1);
        assert_eq!(record.cache_hit_count, 0);
        assert_eq!(record.last_commit_hash, "c1");
        assert_eq!(record.last_scan_findings, Some(3));
        assert_eq!(record.last_scan_status, Some(ScanStatus::Success));
    }

    #[test]
    fn test_scan_count_increments_unconditionally() {
        let store = ScanHistoryStore::new();
        store.update("url", "c1", &success_update(100, 0));
        store.update(
            "url",
            "c1",
            &ScanUpdate {
                status: Some(ScanStatus::Failed),
                ..Default::default()
            },
        );
        store.update(
            "url",
            "c1",
            &ScanUpdate {
                status: Some(ScanStatus::Cached),
                cache_hit: true,
                ..Default::default()
            },
        );

        let record = store.get_last("url").expect("record");
        assert_eq!(record.scan_count, 3);
        assert_eq!(record.cache_hit_count, 1);
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let store = ScanHistoryStore::new();
        store.update("url", "c1", &success_update(100, 0));
        store.update("url", "c2", &success_update(200, 1));
        store.update("url", "c3", &success_update(300, 2));

        let history = store.history("url", 10);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].commit_hash, "c3");
        assert_eq!(history[2].commit_hash, "c1");

        let limited = store.history("url", 2);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].commit_hash, "c3");
    }

    #[test]
    fn test_history_bounded_to_fifty_oldest_dropped() {
        let store = ScanHistoryStore::new();
        for i in 0..60 {
            store.update("url", &format!("c{i}"), &success_update(10, 0));
        }

        let history = store.history("url", 100);
        assert_eq!(history.len(), 50);
        // Most recent first: c59 down to c10; c0..c9 were dropped.
        assert_eq!(history[0].commit_hash, "c59");
        assert_eq!(history[49].commit_hash, "c10");

        // The record still counts every run.
        assert_eq!(store.get_last("url").expect("record").scan_count, 60);
    }

    #[test]
    fn test_statistics_aggregation() {
        let store = ScanHistoryStore::new();
        store.update("url-a", "c1", &success_update(100, 2));
        store.update("url-a", "c2", &success_update(300, 4));
        store.update(
            "url-b",
            "c1",
            &ScanUpdate {
                duration_ms: Some(200),
                status: Some(ScanStatus::Cached),
                findings: Some(1),
                cache_hit: true,
            },
        );

        let stats = store.statistics();
        assert_eq!(stats.total_repositories, 2);
        assert_eq!(stats.total_scans, 3);
        assert_eq!(stats.total_cache_hits, 1);
        assert_eq!(stats.total_findings, 5);
        assert!((stats.average_scan_duration_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_empty_store() {
        let store = ScanHistoryStore::new();
        let stats = store.statistics();
        assert_eq!(stats.total_repositories, 0);
        assert_eq!(stats.total_scans, 0);
        assert!((stats.average_scan_duration_ms - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stale_filters_by_age() {
        let store = ScanHistoryStore::new();
        store.update("url", "c1", &success_update(100, 0));
        // A record created just now is not stale for any positive age.
        assert!(store.stale(1).is_empty());
        // With a negative cutoff in the future, everything is stale.
        assert_eq!(store.stale(-1).len(), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = ScanHistoryStore::new();
        store.update("url", "c1", &success_update(100, 0));
        store.clear();
        assert!(store.get_last("url").is_none());
        assert!(store.history("url", 10).is_empty());
    }
}
