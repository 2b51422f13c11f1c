// SPDX-License-Identifier: Apache-2.0

//! Hosting-provider trait and shared implementations.
//!
//! Defines the [`GitProvider`] trait that all version-control hosting
//! adapters implement, along with default implementations for the git
//! fallback path: commit resolution via `ls-remote`, cloning, metadata
//! derived from a local clone, and file fetching.
//!
//! Adapters with a platform API override the API-backed operations and
//! fall back to these defaults on any API failure. API failure is never
//! fatal when the git fallback succeeds.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::auth::{AuthConfig, authenticated_clone_url};
use crate::error::VigilError;
use crate::gitcmd;

pub mod azure;
pub mod bitbucket;
pub mod git;
pub mod gitea;
pub mod github;
pub mod gitlab;
pub mod registry;
pub mod rest;
pub mod types;

use types::{
    ChangeDetection, CloneOptions, CommitInfo, Platform, ProviderCapabilities, ProviderHealth,
    RepositoryMetadata, RepositoryReference, UNKNOWN_COMMIT,
};

/// A version-control hosting integration.
///
/// One adapter per platform, plus a generic git-protocol fallback. The
/// registry selects the first adapter whose [`can_handle`] accepts a
/// URL, so host-specific adapters must be registered before the
/// fallback.
///
/// [`can_handle`]: GitProvider::can_handle
#[async_trait]
pub trait GitProvider: Send + Sync {
    /// Static description of this adapter.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Credentials this adapter was configured with.
    fn auth(&self) -> &AuthConfig;

    /// Clone options (depth, timeout) for this adapter's internal
    /// fallback clones.
    fn clone_options(&self) -> CloneOptions {
        CloneOptions::default()
    }

    /// Whether this adapter claims the given URL.
    fn can_handle(&self, url: &str) -> bool;

    /// Parses a URL into a repository reference, or `None` when it does
    /// not match this adapter's platform.
    fn parse_url(&self, url: &str) -> Option<RepositoryReference>;

    /// Resolves the current commit hash of the repository's HEAD.
    ///
    /// Returns the `"unknown"` sentinel for repositories whose head
    /// cannot be determined without error (e.g., an empty repository).
    ///
    /// The default implementation asks the remote directly via
    /// `git ls-remote`.
    async fn last_commit_hash(&self, url: &str) -> Result<String, VigilError> {
        let options = self.clone_options();
        let authed = authenticated_clone_url(url, self.capabilities().platform, self.auth());
        let head = gitcmd::ls_remote_head(&authed, options.timeout_seconds).await?;
        Ok(head.unwrap_or_else(|| UNKNOWN_COMMIT.to_string()))
    }

    /// Compares the repository against a previously seen commit.
    ///
    /// Never fails: comparison errors are embedded in the result with
    /// `has_changes: true`, so callers conservatively rescan.
    ///
    /// The default implementation compares hashes only and reports no
    /// diff summary; platform adapters override this with their compare
    /// APIs to attach one.
    async fn changes_since(&self, url: &str, prior_hash: &str) -> ChangeDetection {
        match self.last_commit_hash(url).await {
            Ok(current) if current == UNKNOWN_COMMIT => {
                ChangeDetection::unknown(UNKNOWN_COMMIT, "current commit unknown")
            }
            Ok(current) if current == prior_hash => ChangeDetection::unchanged(&current),
            Ok(current) => ChangeDetection::changed(&current, None),
            Err(err) => ChangeDetection::unknown(UNKNOWN_COMMIT, err.to_string()),
        }
    }

    /// Clones the repository into `dest`.
    ///
    /// The default implementation shells out to `git clone` with this
    /// adapter's credential-embedded URL.
    async fn clone_repository(
        &self,
        url: &str,
        dest: &Path,
        options: &CloneOptions,
    ) -> Result<(), VigilError> {
        let authed = authenticated_clone_url(url, self.capabilities().platform, self.auth());
        gitcmd::clone_repository(&authed, url, dest, options).await
    }

    /// Fetches repository metadata.
    ///
    /// Platform adapters try their API first and fall back to
    /// [`metadata_via_git`] on any failure; the default is the git path
    /// alone.
    ///
    /// [`metadata_via_git`]: GitProvider::metadata_via_git
    async fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata, VigilError> {
        self.metadata_via_git(url).await
    }

    /// Derives the metadata shape from an ephemeral local clone.
    ///
    /// Used as the universal fallback when a platform API is missing or
    /// failing: latest commit from `git log`, branch from `rev-parse`,
    /// and the first non-trivial README line (truncated to 200 chars)
    /// as the description.
    async fn metadata_via_git(&self, url: &str) -> Result<RepositoryMetadata, VigilError> {
        let reference = self
            .parse_url(url)
            .ok_or_else(|| VigilError::InvalidUrl {
                url: url.to_string(),
            })?;

        debug!(url, "Deriving metadata from ephemeral clone");
        let workdir = tempfile::tempdir()?;
        let options = self.clone_options();
        self.clone_repository(url, workdir.path(), &options).await?;

        let last_commit = gitcmd::local_head_commit(workdir.path(), options.timeout_seconds)
            .await
            .map_err(|err| VigilError::Metadata {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        let default_branch = gitcmd::local_branch(workdir.path(), options.timeout_seconds)
            .await
            .unwrap_or_else(|_| "main".to_string());
        let description = gitcmd::readme_description(workdir.path());

        Ok(RepositoryMetadata {
            name: reference.repository,
            description,
            default_branch,
            last_commit,
            platform_specific: HashMap::new(),
            common: types::CommonMetadata::default(),
        })
    }

    /// Fetches one file's content at a reference.
    ///
    /// The default implementation shallow-clones and reads from disk;
    /// API adapters override with their raw-content endpoints.
    async fn fetch_file(
        &self,
        url: &str,
        path: &str,
        _reference: &str,
    ) -> Result<String, VigilError> {
        if Path::new(path)
            .components()
            .any(|component| matches!(component, std::path::Component::ParentDir))
        {
            return Err(VigilError::FileContent {
                path: path.to_string(),
                message: "path escapes the repository".to_string(),
            });
        }

        let workdir = tempfile::tempdir()?;
        let options = self.clone_options();
        self.clone_repository(url, workdir.path(), &options).await?;

        let file_path = workdir.path().join(path);
        std::fs::read_to_string(&file_path).map_err(|err| VigilError::FileContent {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    /// Probes the platform for availability and credential validity.
    ///
    /// The default implementation measures a `ls-remote` against a
    /// well-known public repository on the platform's primary host, or
    /// reports healthy-by-construction when the adapter has no fixed
    /// host to probe.
    async fn health_check(&self) -> ProviderHealth {
        let capabilities = self.capabilities();
        let Some(host) = capabilities.hostnames.first() else {
            return ProviderHealth {
                name: capabilities.name.clone(),
                is_healthy: true,
                response_time_ms: 0,
                auth_valid: None,
            };
        };

        let probe_url = format!("https://{host}/");
        let started = Instant::now();
        let healthy = gitcmd::run_git(&["ls-remote", "--exit-code", &probe_url], None, 10)
            .await
            .is_ok();
        #[allow(clippy::cast_possible_truncation)]
        let response_time_ms = started.elapsed().as_millis() as u64;

        if !healthy {
            warn!(provider = %capabilities.name, host, "Provider health probe failed");
        }

        ProviderHealth {
            name: capabilities.name.clone(),
            is_healthy: healthy,
            response_time_ms,
            auth_valid: None,
        }
    }
}

/// Parses an HTTPS repository URL for a fixed set of hostnames.
///
/// Shared by the host-specific adapters: accepts
/// `https://<host>/<owner>/<repo>[.git][/...]` for any of the given
/// hostnames and builds a [`RepositoryReference`] for `platform`.
#[must_use]
pub fn parse_hosted_url(
    url: &str,
    platform: Platform,
    hostnames: &[String],
) -> Option<RepositoryReference> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let (host, path) = rest.split_once('/')?;
    if !hostnames.iter().any(|candidate| candidate == host) {
        return None;
    }

    let mut segments = path.trim_end_matches('/').splitn(3, '/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repository = segments
        .next()
        .filter(|s| !s.is_empty())?
        .trim_end_matches(".git");

    Some(RepositoryReference::new(
        url, platform, host, owner, repository,
    ))
}

/// Builds a [`CommitInfo`] from loosely-typed API fields.
///
/// Platform payloads disagree on timestamp field names and formats;
/// this normalizes the common case of an RFC 3339 string.
#[must_use]
pub fn commit_info_from_parts(
    hash: &str,
    timestamp: Option<&str>,
    message: Option<&str>,
    author: Option<&str>,
) -> CommitInfo {
    CommitInfo {
        hash: hash.to_string(),
        timestamp: timestamp
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map_or_else(chrono::Utc::now, |parsed| {
                parsed.with_timezone(&chrono::Utc)
            }),
        message: message.map(|m| m.lines().next().unwrap_or(m).to_string()),
        author: author.map(ToString::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_hosted_url_basic() {
        let reference = parse_hosted_url(
            "https://github.com/rust-lang/cargo",
            Platform::GitHub,
            &hosts(&["github.com"]),
        )
        .expect("parses");
        assert_eq!(reference.owner, "rust-lang");
        assert_eq!(reference.repository, "cargo");
        assert_eq!(reference.full_name, "rust-lang/cargo");
    }

    #[test]
    fn test_parse_hosted_url_strips_git_suffix() {
        let reference = parse_hosted_url(
            "https://gitlab.com/group/project.git",
            Platform::GitLab,
            &hosts(&["gitlab.com"]),
        )
        .expect("parses");
        assert_eq!(reference.repository, "project");
    }

    #[test]
    fn test_parse_hosted_url_rejects_other_hosts() {
        assert!(
            parse_hosted_url(
                "https://example.com/owner/repo",
                Platform::GitHub,
                &hosts(&["github.com"]),
            )
            .is_none()
        );
    }

    #[test]
    fn test_parse_hosted_url_rejects_missing_repo() {
        assert!(
            parse_hosted_url(
                "https://github.com/owner",
                Platform::GitHub,
                &hosts(&["github.com"]),
            )
            .is_none()
        );
    }

    #[test]
    fn test_parse_hosted_url_ignores_extra_path_segments() {
        let reference = parse_hosted_url(
            "https://github.com/owner/repo/tree/main/src",
            Platform::GitHub,
            &hosts(&["github.com"]),
        )
        .expect("parses");
        assert_eq!(reference.repository, "repo");
    }

    #[test]
    fn test_commit_info_from_parts_first_line_only() {
        let info = commit_info_from_parts(
            "abc123",
            Some("2024-06-01T12:00:00Z"),
            Some("subject line\n\nbody text"),
            Some("Alice"),
        );
        assert_eq!(info.message.as_deref(), Some("subject line"));
        assert_eq!(info.author.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_commit_info_bad_timestamp_falls_back_to_now() {
        let info = commit_info_from_parts("abc123", Some("not-a-date"), None, None);
        // Falls back to "now"; just assert it is recent enough to be sane.
        assert!(chrono::Utc::now().signed_duration_since(info.timestamp) < chrono::Duration::minutes(1));
    }
}
