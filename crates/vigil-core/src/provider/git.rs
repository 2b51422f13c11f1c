// SPDX-License-Identifier: Apache-2.0

//! Generic git-protocol provider adapter.
//!
//! The registry's last-resort fallback: claims any URL that plausibly
//! speaks the git protocol and serves every operation through the `git`
//! CLI defaults on the provider trait. No platform API, so change
//! detection is hash comparison only and metadata comes from an
//! ephemeral clone.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::auth::AuthConfig;
use crate::provider::types::{
    CloneOptions, Platform, ProviderCapabilities, RepositoryReference,
};
use crate::provider::GitProvider;

/// Matches scp-like remotes: `git@host:owner/repo.git`.
static SCP_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9._-]+)@([A-Za-z0-9._-]+):(.+?)(?:\.git)?/?$")
        .expect("valid scp remote regex")
});

/// Matches URL remotes: `https://host/path/repo.git`, `git://`, `ssh://`.
static URL_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?|git|ssh)://(?:[^@/]+@)?([A-Za-z0-9._-]+)(?::\d+)?/(.+?)(?:\.git)?/?$")
        .expect("valid url remote regex")
});

/// Generic git-protocol adapter.
pub struct GenericGitProvider {
    capabilities: ProviderCapabilities,
    auth: AuthConfig,
    clone_options: CloneOptions,
}

impl GenericGitProvider {
    /// Creates the generic fallback adapter.
    #[must_use]
    pub fn new(auth: AuthConfig, clone_options: CloneOptions) -> Self {
        Self {
            capabilities: ProviderCapabilities {
                name: "generic-git".to_string(),
                platform: Platform::GenericGit,
                hostnames: Vec::new(),
                supports_private_repos: true,
                supports_api: false,
                auth_kind: auth.kind,
                rate_limit: None,
            },
            auth,
            clone_options,
        }
    }

    /// Splits a remote path into (owner, repository) using the last two
    /// segments, tolerating nested group paths.
    fn split_path(path: &str) -> Option<(String, String)> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let repository = segments.pop()?.to_string();
        let owner = if segments.is_empty() {
            repository.clone()
        } else {
            segments.join("/")
        };
        Some((owner, repository))
    }
}

#[async_trait]
impl GitProvider for GenericGitProvider {
    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    fn clone_options(&self) -> CloneOptions {
        self.clone_options.clone()
    }

    fn can_handle(&self, url: &str) -> bool {
        self.parse_url(url).is_some()
    }

    fn parse_url(&self, url: &str) -> Option<RepositoryReference> {
        let url = url.trim();
        let (host, path) = if let Some(caps) = SCP_REMOTE.captures(url) {
            (caps.get(1)?.as_str(), caps.get(2)?.as_str())
        } else if let Some(caps) = URL_REMOTE.captures(url) {
            (caps.get(1)?.as_str(), caps.get(2)?.as_str())
        } else {
            return None;
        };

        let (owner, repository) = Self::split_path(path)?;
        Some(RepositoryReference::new(
            url,
            Platform::GenericGit,
            host,
            &owner,
            &repository,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GenericGitProvider {
        GenericGitProvider::new(AuthConfig::none(), CloneOptions::default())
    }

    #[test]
    fn test_parses_https_remote() {
        let reference = provider()
            .parse_url("https://git.example.com/team/service.git")
            .expect("parses");
        assert_eq!(reference.platform, Platform::GenericGit);
        assert_eq!(reference.hostname, "git.example.com");
        assert_eq!(reference.owner, "team");
        assert_eq!(reference.repository, "service");
    }

    #[test]
    fn test_parses_scp_like_remote() {
        let reference = provider()
            .parse_url("git@git.example.com:team/service.git")
            .expect("parses");
        assert_eq!(reference.hostname, "git.example.com");
        assert_eq!(reference.full_name, "team/service");
    }

    #[test]
    fn test_parses_nested_group_path() {
        let reference = provider()
            .parse_url("https://git.example.com/org/group/service")
            .expect("parses");
        assert_eq!(reference.owner, "org/group");
        assert_eq!(reference.repository, "service");
    }

    #[test]
    fn test_parses_git_protocol() {
        let reference = provider()
            .parse_url("git://git.example.com/team/service")
            .expect("parses");
        assert_eq!(reference.hostname, "git.example.com");
    }

    #[test]
    fn test_rejects_non_git_input() {
        assert!(provider().parse_url("not a url at all").is_none());
        assert!(provider().parse_url("ftp://example.com/team/repo").is_none());
    }

    #[test]
    fn test_handles_github_urls_too() {
        // The generic adapter would accept github.com URLs; registry
        // ordering is what keeps the GitHub adapter in front of it.
        assert!(provider().can_handle("https://github.com/owner/repo"));
    }

    #[test]
    fn test_capabilities_no_api() {
        let provider = provider();
        assert!(!provider.capabilities().supports_api);
        assert!(provider.capabilities().hostnames.is_empty());
    }
}
