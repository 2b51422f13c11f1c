// SPDX-License-Identifier: Apache-2.0

//! In-memory scan result cache with TTL expiry and capacity eviction.
//!
//! Entries are keyed by `(repository URL, commit hash)` with at most one
//! live entry per pair. Expiry is lazy on reads plus a background sweep
//! on a fixed interval; capacity is bounded by evicting the oldest 10%
//! of entries immediately before an insert would exceed the maximum.
//!
//! The cache is process-wide shared state: interior synchronization,
//! explicitly constructed and passed by `Arc` into the orchestrator so
//! tests can build isolated instances.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CacheConfig;

/// A cached payload with its expiry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Repository URL half of the key.
    pub repo_url: String,
    /// Commit hash half of the key.
    pub commit_hash: String,
    /// The cached payload.
    pub payload: T,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// Entry-specific time-to-live in milliseconds.
    pub ttl_ms: i64,
}

impl<T> CacheEntry<T> {
    /// Whether the entry's TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) >= Duration::milliseconds(self.ttl_ms)
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live (unexpired) entry count.
    pub total_entries: usize,
    /// Creation time of the oldest live entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    /// Creation time of the newest live entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
}

/// In-memory key-value cache of scan payloads.
pub struct ScanCache<T> {
    entries: RwLock<HashMap<(String, String), CacheEntry<T>>>,
    default_ttl: Duration,
    max_entries: usize,
}

impl<T: Clone + Send + Sync + 'static> ScanCache<T> {
    /// Creates a cache from configuration.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(
            Duration::seconds(i64::try_from(config.ttl_seconds).unwrap_or(3600)),
            config.max_entries,
        )
    }

    /// Creates a cache with explicit TTL and capacity.
    #[must_use]
    pub fn with_limits(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            max_entries,
        }
    }

    /// Looks up a payload; an expired entry is removed and reported as
    /// a miss.
    #[must_use]
    pub fn get(&self, repo_url: &str, commit_hash: &str) -> Option<T> {
        let key = (repo_url.to_string(), commit_hash.to_string());
        let now = Utc::now();

        {
            let entries = self.entries.read().expect("cache lock poisoned");
            match entries.get(&key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.payload.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: upgrade to a write lock and remove lazily.
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if entries.get(&key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(&key);
        }
        None
    }

    /// Stores a payload under `(repo_url, commit_hash)` with the
    /// default TTL, evicting the oldest 10% first when at capacity.
    pub fn put(&self, repo_url: &str, commit_hash: &str, payload: T) {
        self.put_with_ttl(repo_url, commit_hash, payload, self.default_ttl);
    }

    /// Stores a payload with an entry-specific TTL.
    pub fn put_with_ttl(&self, repo_url: &str, commit_hash: &str, payload: T, ttl: Duration) {
        let key = (repo_url.to_string(), commit_hash.to_string());
        let mut entries = self.entries.write().expect("cache lock poisoned");

        // Replacing an existing key never triggers eviction; the pair
        // invariant keeps the entry count unchanged.
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let evict_count = (self.max_entries / 10).max(1);
            let mut by_age: Vec<((String, String), DateTime<Utc>)> = entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.created_at))
                .collect();
            by_age.sort_by_key(|(_, created_at)| *created_at);
            for (old_key, _) in by_age.into_iter().take(evict_count) {
                entries.remove(&old_key);
            }
            debug!(evicted = evict_count, "Cache capacity eviction");
        }

        entries.insert(
            key,
            CacheEntry {
                repo_url: repo_url.to_string(),
                commit_hash: commit_hash.to_string(),
                payload,
                created_at: Utc::now(),
                ttl_ms: ttl.num_milliseconds(),
            },
        );
    }

    /// The most recent live entry for a repository, regardless of
    /// commit.
    #[must_use]
    pub fn latest_for_repo(&self, repo_url: &str) -> Option<CacheEntry<T>> {
        self.entries_for_repo(repo_url).into_iter().next()
    }

    /// All live entries for a repository, newest first.
    #[must_use]
    pub fn entries_for_repo(&self, repo_url: &str) -> Vec<CacheEntry<T>> {
        let now = Utc::now();
        let entries = self.entries.read().expect("cache lock poisoned");
        let mut matching: Vec<CacheEntry<T>> = entries
            .values()
            .filter(|entry| entry.repo_url == repo_url && !entry.is_expired(now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    /// Removes every entry for a repository. Returns how many were
    /// removed.
    pub fn invalidate_repository(&self, repo_url: &str) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|(url, _), _| url != repo_url);
        before - entries.len()
    }

    /// Removes one entry. Returns whether it existed.
    pub fn invalidate_entry(&self, repo_url: &str, commit_hash: &str) -> bool {
        let key = (repo_url.to_string(), commit_hash.to_string());
        self.entries
            .write()
            .expect("cache lock poisoned")
            .remove(&key)
            .is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }

    /// Removes expired entries eagerly. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Cache sweep removed expired entries");
        }
        removed
    }

    /// Aggregate statistics over live entries.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.entries.read().expect("cache lock poisoned");
        let live: Vec<DateTime<Utc>> = entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.created_at)
            .collect();

        CacheStats {
            total_entries: live.len(),
            oldest: live.iter().min().copied(),
            newest: live.iter().max().copied(),
        }
    }

    /// Spawns the background expiry sweeper.
    ///
    /// The task holds only a `Weak` reference and exits when the cache
    /// is dropped, so memory stays bounded between reads without
    /// pinning the cache alive.
    pub fn spawn_sweeper(cache: &Arc<Self>, interval: StdDuration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ScanCache<String> {
        ScanCache::with_limits(Duration::hours(1), 100)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let cache = cache();
        cache.put("https://github.com/a/b", "c1", "report".to_string());
        assert_eq!(
            cache.get("https://github.com/a/b", "c1").as_deref(),
            Some("report")
        );
    }

    #[test]
    fn test_get_miss_on_unknown_key() {
        let cache = cache();
        assert!(cache.get("https://github.com/a/b", "c1").is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let cache = ScanCache::with_limits(Duration::milliseconds(-1), 100);
        cache.put("url", "c1", "report".to_string());
        assert!(cache.get("url", "c1").is_none());
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn test_one_live_entry_per_pair() {
        let cache = cache();
        cache.put("url", "c1", "first".to_string());
        cache.put("url", "c1", "second".to_string());
        assert_eq!(cache.stats().total_entries, 1);
        assert_eq!(cache.get("url", "c1").as_deref(), Some("second"));
    }

    #[test]
    fn test_capacity_eviction_bounds_entries() {
        let cache = ScanCache::with_limits(Duration::hours(1), 10);
        for i in 0..15 {
            cache.put("url", &format!("c{i}"), format!("report {i}"));
        }
        // Inserts beyond capacity each evict max(1, 10/10) = 1 oldest
        // entry first, so the count never exceeds the maximum.
        assert!(cache.stats().total_entries <= 10);
        // The newest entry survives, the oldest was evicted.
        assert!(cache.get("url", "c14").is_some());
        assert!(cache.get("url", "c0").is_none());
    }

    #[test]
    fn test_eviction_removes_ten_percent_minimum_one() {
        let cache = ScanCache::with_limits(Duration::hours(1), 30);
        for i in 0..30 {
            cache.put("url", &format!("c{i}"), String::new());
        }
        assert_eq!(cache.stats().total_entries, 30);
        cache.put("url", "c30", String::new());
        // 30/10 = 3 evicted, then one inserted.
        assert_eq!(cache.stats().total_entries, 28);
    }

    #[test]
    fn test_entries_for_repo_newest_first() {
        let cache = cache();
        cache.put("url-a", "c1", "one".to_string());
        cache.put("url-a", "c2", "two".to_string());
        cache.put("url-b", "c9", "other".to_string());

        let entries = cache.entries_for_repo("url-a");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].created_at >= entries[1].created_at);
        assert!(entries.iter().all(|entry| entry.repo_url == "url-a"));
    }

    #[test]
    fn test_latest_for_repo() {
        let cache = cache();
        assert!(cache.latest_for_repo("url").is_none());
        cache.put("url", "c1", "one".to_string());
        cache.put("url", "c2", "two".to_string());
        let latest = cache.latest_for_repo("url").expect("latest");
        // Both inserts can share a timestamp; any of the two is valid.
        assert!(latest.commit_hash == "c1" || latest.commit_hash == "c2");
    }

    #[test]
    fn test_invalidate_repository() {
        let cache = cache();
        cache.put("url-a", "c1", String::new());
        cache.put("url-a", "c2", String::new());
        cache.put("url-b", "c1", String::new());

        assert_eq!(cache.invalidate_repository("url-a"), 2);
        assert_eq!(cache.stats().total_entries, 1);
        assert!(cache.get("url-b", "c1").is_some());
    }

    #[test]
    fn test_invalidate_entry() {
        let cache = cache();
        cache.put("url", "c1", String::new());
        assert!(cache.invalidate_entry("url", "c1"));
        assert!(!cache.invalidate_entry("url", "c1"));
    }

    #[test]
    fn test_clear() {
        let cache = cache();
        cache.put("url", "c1", String::new());
        cache.clear();
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[test]
    fn test_sweep_removes_expired_without_reads() {
        let cache = ScanCache::with_limits(Duration::hours(1), 100);
        cache.put_with_ttl("url", "c1", String::new(), Duration::milliseconds(-1));
        cache.put("url", "c2", String::new());

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.stats().total_entries, 1);
    }

    #[test]
    fn test_stats_oldest_newest() {
        let cache = cache();
        assert!(cache.stats().oldest.is_none());
        cache.put("url", "c1", String::new());
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.oldest, stats.newest);
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_cache_dropped() {
        let cache = Arc::new(ScanCache::<String>::with_limits(Duration::hours(1), 10));
        let handle = ScanCache::spawn_sweeper(&cache, StdDuration::from_millis(10));
        drop(cache);
        // The sweeper notices the dropped cache on its next tick.
        tokio::time::timeout(StdDuration::from_secs(2), handle)
            .await
            .expect("sweeper exits")
            .expect("sweeper task does not panic");
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = Arc::new(ScanCache::<String>::with_limits(Duration::hours(1), 10));
        cache.put_with_ttl("url", "c1", String::new(), Duration::milliseconds(5));
        let _handle = ScanCache::spawn_sweeper(&cache, StdDuration::from_millis(10));

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(cache.stats().total_entries, 0);
    }
}
