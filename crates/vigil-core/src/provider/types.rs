// SPDX-License-Identifier: Apache-2.0

//! Data types shared by all hosting-provider adapters.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthKind;

/// A version-control hosting platform.
///
/// This is a closed enumeration: unknown hosts are handled by the
/// generic git-protocol adapter, not by extending the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Any host speaking the git protocol, no platform API.
    GenericGit,
    /// github.com and GitHub Enterprise.
    GitHub,
    /// gitlab.com and self-hosted GitLab.
    GitLab,
    /// bitbucket.org.
    Bitbucket,
    /// dev.azure.com.
    AzureDevOps,
    /// Self-hosted Gitea.
    Gitea,
    /// Self-hosted Forgejo.
    Forgejo,
    /// codeberg.org (Forgejo-based).
    Codeberg,
}

impl Platform {
    /// Lowercase platform identifier for logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::GenericGit => "generic-git",
            Platform::GitHub => "github",
            Platform::GitLab => "gitlab",
            Platform::Bitbucket => "bitbucket",
            Platform::AzureDevOps => "azure-devops",
            Platform::Gitea => "gitea",
            Platform::Forgejo => "forgejo",
            Platform::Codeberg => "codeberg",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed reference to a remote repository.
///
/// Immutable once parsed; produced by a provider's `parse_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    /// The URL exactly as supplied by the caller.
    pub original_url: String,
    /// The platform the owning adapter identified.
    pub platform: Platform,
    /// Hostname component of the URL.
    pub hostname: String,
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name, without any `.git` suffix.
    pub repository: String,
    /// `owner/repository`.
    pub full_name: String,
}

impl RepositoryReference {
    /// Builds a reference from its parts, deriving `full_name`.
    #[must_use]
    pub fn new(
        original_url: &str,
        platform: Platform,
        hostname: &str,
        owner: &str,
        repository: &str,
    ) -> Self {
        Self {
            original_url: original_url.to_string(),
            platform,
            hostname: hostname.to_string(),
            owner: owner.to_string(),
            repository: repository.to_string(),
            full_name: format!("{owner}/{repository}"),
        }
    }
}

/// Static description of what a provider adapter can do.
///
/// Used by the registry for selection and capability queries; never
/// mutated after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Adapter name (e.g., `github`).
    pub name: String,
    /// The platform this adapter integrates with.
    pub platform: Platform,
    /// Hostnames this adapter claims. Empty for the generic fallback.
    pub hostnames: Vec<String>,
    /// Whether private repositories are reachable (given credentials).
    pub supports_private_repos: bool,
    /// Whether a platform API is available (vs. git protocol only).
    pub supports_api: bool,
    /// The authentication kind this adapter is configured with.
    pub auth_kind: AuthKind,
    /// Documented API rate limit in requests/hour, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// Result of a provider health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Adapter name.
    pub name: String,
    /// Whether the platform endpoint responded.
    pub is_healthy: bool,
    /// Probe round-trip time in milliseconds.
    pub response_time_ms: u64,
    /// Whether configured credentials were accepted. `None` when no
    /// credentials are configured.
    pub auth_valid: Option<bool>,
}

/// The most recent commit on a repository's default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// Commit timestamp.
    pub timestamp: DateTime<Utc>,
    /// First line of the commit message, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Author name, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Platform-independent slice of repository metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonMetadata {
    /// `public` or `private`, when the platform reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Star / favorite count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    /// Fork count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forks: Option<u64>,
    /// Dominant language.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// License identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// Repository metadata as returned by one fetch.
///
/// Produced fresh on each metadata fetch; never persisted beyond the
/// report that embeds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// Repository name.
    pub name: String,
    /// Repository description, possibly derived from a README fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default branch name.
    pub default_branch: String,
    /// Most recent commit on the default branch.
    pub last_commit: CommitInfo,
    /// Raw platform-specific fields, passed through untyped.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub platform_specific: HashMap<String, serde_json::Value>,
    /// Normalized cross-platform fields.
    #[serde(default)]
    pub common: CommonMetadata,
}

/// Aggregate numbers for a commit-range comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Files touched across the range.
    pub files_changed: u64,
    /// Added lines.
    pub additions: u64,
    /// Deleted lines.
    pub deletions: u64,
    /// Commits in the range.
    pub commits: u64,
}

impl ChangeSummary {
    /// Whether the summary describes an actually-empty diff.
    ///
    /// Any nonzero count makes the change significant; there is no
    /// smaller-than-threshold notion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files_changed == 0 && self.additions == 0 && self.deletions == 0 && self.commits == 0
    }
}

/// Outcome of comparing a repository against a previously seen commit.
///
/// Comparison errors are embedded, not returned: an adapter that cannot
/// compare (unknown hash on either side, API refusal) reports
/// `has_changes: true` with the error noted, so the orchestrator
/// conservatively rescans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDetection {
    /// Whether the repository content is considered changed.
    pub has_changes: bool,
    /// The commit hash the repository is currently at.
    pub last_commit_hash: String,
    /// Diff totals for the compared range, when the platform provides them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ChangeSummary>,
    /// Comparison error, when the result is a conservative fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChangeDetection {
    /// A comparison that found the given summary of changes.
    #[must_use]
    pub fn changed(current: &str, summary: Option<ChangeSummary>) -> Self {
        Self {
            has_changes: true,
            last_commit_hash: current.to_string(),
            summary,
            error: None,
        }
    }

    /// A comparison that found no difference.
    #[must_use]
    pub fn unchanged(current: &str) -> Self {
        Self {
            has_changes: false,
            last_commit_hash: current.to_string(),
            summary: Some(ChangeSummary::default()),
            error: None,
        }
    }

    /// A failed comparison, treated conservatively as changed.
    #[must_use]
    pub fn unknown(current: &str, error: impl Into<String>) -> Self {
        Self {
            has_changes: true,
            last_commit_hash: current.to_string(),
            summary: None,
            error: Some(error.into()),
        }
    }
}

/// Options for cloning into an ephemeral workspace.
#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// History depth; 1 gives a shallow clone.
    pub depth: u32,
    /// Wall-clock limit for the clone subprocess, in seconds.
    pub timeout_seconds: u64,
    /// Branch to clone; `None` clones the default branch.
    pub branch: Option<String>,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            timeout_seconds: 300,
            branch: None,
        }
    }
}

/// Sentinel commit value for repositories whose head cannot be resolved
/// without error (e.g., an empty repository).
pub const UNKNOWN_COMMIT: &str = "unknown";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_serde_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Platform::AzureDevOps).unwrap(),
            "\"azure-devops\""
        );
        assert_eq!(
            serde_json::to_string(&Platform::GenericGit).unwrap(),
            "\"generic-git\""
        );
        let parsed: Platform = serde_json::from_str("\"gitlab\"").unwrap();
        assert_eq!(parsed, Platform::GitLab);
    }

    #[test]
    fn test_repository_reference_full_name() {
        let reference = RepositoryReference::new(
            "https://github.com/rust-lang/cargo",
            Platform::GitHub,
            "github.com",
            "rust-lang",
            "cargo",
        );
        assert_eq!(reference.full_name, "rust-lang/cargo");
        assert_eq!(reference.hostname, "github.com");
    }

    #[test]
    fn test_change_summary_is_empty() {
        assert!(ChangeSummary::default().is_empty());
        assert!(
            !ChangeSummary {
                files_changed: 1,
                ..Default::default()
            }
            .is_empty()
        );
        assert!(
            !ChangeSummary {
                commits: 2,
                ..Default::default()
            }
            .is_empty()
        );
    }

    #[test]
    fn test_change_detection_unknown_is_conservative() {
        let detection = ChangeDetection::unknown("abc123", "commit not found");
        assert!(detection.has_changes);
        assert!(detection.summary.is_none());
        assert_eq!(detection.error.as_deref(), Some("commit not found"));
    }

    #[test]
    fn test_change_detection_unchanged_has_empty_summary() {
        let detection = ChangeDetection::unchanged("abc123");
        assert!(!detection.has_changes);
        assert!(detection.summary.expect("summary").is_empty());
    }
}
