// SPDX-License-Identifier: Apache-2.0

//! Gitea-family provider adapter.
//!
//! Gitea, Forgejo, and Codeberg share one API surface (`/api/v1`), so a
//! single adapter covers all three; the reported platform is derived
//! from the hostname. Self-hosted instances can be claimed by
//! constructing the adapter with additional hostnames.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::warn;

use crate::auth::AuthConfig;
use crate::error::VigilError;
use crate::provider::rest;
use crate::provider::types::{
    ChangeDetection, ChangeSummary, CloneOptions, CommonMetadata, Platform, ProviderCapabilities,
    ProviderHealth, RepositoryMetadata, RepositoryReference, UNKNOWN_COMMIT,
};
use crate::provider::{GitProvider, commit_info_from_parts, parse_hosted_url};

/// Gitea / Forgejo / Codeberg hosting adapter.
pub struct GiteaProvider {
    capabilities: ProviderCapabilities,
    auth: AuthConfig,
    http: reqwest::Client,
    clone_options: CloneOptions,
}

/// Maps a Gitea-family hostname to its platform label.
#[must_use]
pub fn platform_for_host(hostname: &str) -> Platform {
    match hostname {
        "codeberg.org" => Platform::Codeberg,
        host if host.contains("forgejo") => Platform::Forgejo,
        _ => Platform::Gitea,
    }
}

impl GiteaProvider {
    /// Creates a Gitea-family adapter for the well-known public hosts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        auth: AuthConfig,
        api_timeout_seconds: u64,
        clone_options: CloneOptions,
    ) -> Result<Self, VigilError> {
        Self::with_hostnames(
            auth,
            api_timeout_seconds,
            clone_options,
            vec!["gitea.com".to_string(), "codeberg.org".to_string()],
        )
    }

    /// Creates an adapter claiming the given hostnames (for self-hosted
    /// instances).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_hostnames(
        auth: AuthConfig,
        api_timeout_seconds: u64,
        clone_options: CloneOptions,
        hostnames: Vec<String>,
    ) -> Result<Self, VigilError> {
        Ok(Self {
            capabilities: ProviderCapabilities {
                name: "gitea".to_string(),
                platform: Platform::Gitea,
                hostnames,
                supports_private_repos: true,
                supports_api: true,
                auth_kind: auth.kind,
                rate_limit: None,
            },
            auth,
            http: rest::api_client(api_timeout_seconds)?,
            clone_options,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(url);
        if let Some(token) = self.auth.token.as_ref() {
            builder = builder.header(
                "Authorization",
                format!("token {}", token.expose_secret()),
            );
        }
        builder
    }

    fn api_base(reference: &RepositoryReference) -> String {
        format!(
            "https://{}/api/v1/repos/{}",
            reference.hostname, reference.full_name
        )
    }

    fn reference(&self, url: &str) -> Result<RepositoryReference, VigilError> {
        self.parse_url(url).ok_or_else(|| VigilError::InvalidUrl {
            url: url.to_string(),
        })
    }

    async fn head_via_api(
        &self,
        reference: &RepositoryReference,
    ) -> Result<serde_json::Value, VigilError> {
        let endpoint = format!("{}/commits?limit=1", Self::api_base(reference));
        let commits = rest::get_json("gitea", || self.request(&endpoint)).await?;
        Ok(commits
            .as_array()
            .and_then(|list| list.first())
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl GitProvider for GiteaProvider {
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
        let parsed = parse_hosted_url(url, Platform::Gitea, &self.capabilities.hostnames)?;
        let platform = platform_for_host(&parsed.hostname);
        Some(RepositoryReference {
            platform,
            ..parsed
        })
    }

    async fn last_commit_hash(&self, url: &str) -> Result<String, VigilError> {
        let reference = self.reference(url)?;
        match self.head_via_api(&reference).await {
            Ok(head) => Ok(rest::str_field(&head, "/sha")
                .unwrap_or_else(|| UNKNOWN_COMMIT.to_string())),
            Err(err) => {
                warn!(url, error = %err, "Gitea commits API failed, falling back to ls-remote");
                let authed =
                    crate::auth::authenticated_clone_url(url, reference.platform, &self.auth);
                let head =
                    crate::gitcmd::ls_remote_head(&authed, self.clone_options.timeout_seconds)
                        .await?;
                Ok(head.unwrap_or_else(|| UNKNOWN_COMMIT.to_string()))
            }
        }
    }

    async fn changes_since(&self, url: &str, prior_hash: &str) -> ChangeDetection {
        let Ok(reference) = self.reference(url) else {
            return ChangeDetection::unknown(UNKNOWN_COMMIT, format!("invalid URL: {url}"));
        };
        let current = match self.last_commit_hash(url).await {
            Ok(hash) if hash != UNKNOWN_COMMIT => hash,
            Ok(_) => return ChangeDetection::unknown(UNKNOWN_COMMIT, "current commit unknown"),
            Err(err) => return ChangeDetection::unknown(UNKNOWN_COMMIT, err.to_string()),
        };
        if current == prior_hash {
            return ChangeDetection::unchanged(&current);
        }

        let endpoint = format!(
            "{}/compare/{prior_hash}...{current}",
            Self::api_base(&reference)
        );
        match rest::get_json("gitea", || self.request(&endpoint)).await {
            Ok(comparison) => {
                let commits = rest::u64_field(&comparison, "/total_commits").unwrap_or_else(|| {
                    comparison
                        .get("commits")
                        .and_then(serde_json::Value::as_array)
                        .map_or(0, Vec::len) as u64
                });
                let files = comparison
                    .get("files")
                    .and_then(serde_json::Value::as_array)
                    .map_or(0, Vec::len) as u64;
                let summary = ChangeSummary {
                    files_changed: files,
                    additions: 0,
                    deletions: 0,
                    commits,
                };
                if summary.is_empty() {
                    ChangeDetection {
                        has_changes: false,
                        last_commit_hash: current,
                        summary: Some(summary),
                        error: None,
                    }
                } else {
                    ChangeDetection::changed(&current, Some(summary))
                }
            }
            Err(err) => {
                warn!(url, error = %err, "Gitea compare API failed, assuming changes");
                ChangeDetection::unknown(&current, err.to_string())
            }
        }
    }

    async fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata, VigilError> {
        let reference = self.reference(url)?;
        let endpoint = Self::api_base(&reference);
        let repository = match rest::get_json("gitea", || self.request(&endpoint)).await {
            Ok(repository) => repository,
            Err(err) => {
                warn!(url, error = %err, "Gitea repository API failed, falling back to clone");
                return self.metadata_via_git(url).await;
            }
        };

        let head = self.head_via_api(&reference).await.unwrap_or_default();
        let last_commit = commit_info_from_parts(
            rest::str_field(&head, "/sha")
                .as_deref()
                .unwrap_or(UNKNOWN_COMMIT),
            rest::str_field(&head, "/commit/committer/date").as_deref(),
            rest::str_field(&head, "/commit/message").as_deref(),
            rest::str_field(&head, "/commit/author/name").as_deref(),
        );

        let mut platform_specific = HashMap::new();
        if let Some(issues) = rest::u64_field(&repository, "/open_issues_count") {
            platform_specific.insert("open_issues".to_string(), serde_json::json!(issues));
        }
        if let Some(mirror) = repository.get("mirror").and_then(serde_json::Value::as_bool) {
            platform_specific.insert("mirror".to_string(), serde_json::json!(mirror));
        }

        let is_private = repository
            .get("private")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        Ok(RepositoryMetadata {
            name: rest::str_field(&repository, "/name")
                .unwrap_or_else(|| reference.repository.clone()),
            description: rest::str_field(&repository, "/description").filter(|d| !d.is_empty()),
            default_branch: rest::str_field(&repository, "/default_branch")
                .unwrap_or_else(|| "main".to_string()),
            last_commit,
            platform_specific,
            common: CommonMetadata {
                visibility: Some(if is_private { "private" } else { "public" }.to_string()),
                stars: rest::u64_field(&repository, "/stars_count"),
                forks: rest::u64_field(&repository, "/forks_count"),
                language: rest::str_field(&repository, "/language").filter(|l| !l.is_empty()),
                license: None,
            },
        })
    }

    async fn fetch_file(
        &self,
        url: &str,
        path: &str,
        reference: &str,
    ) -> Result<String, VigilError> {
        let repo_ref = self.reference(url)?;
        let endpoint = format!(
            "{}/raw/{path}?ref={reference}",
            Self::api_base(&repo_ref)
        );

        match self.request(&endpoint).send().await {
            Ok(resp) if resp.status().is_success() => Ok(resp.text().await?),
            Ok(resp) => {
                warn!(url, path, status = %resp.status(), "Gitea raw API failed, falling back to clone");
                self.file_via_clone(url, path).await
            }
            Err(err) => {
                warn!(url, path, error = %err, "Gitea raw API unreachable, falling back to clone");
                self.file_via_clone(url, path).await
            }
        }
    }

    async fn health_check(&self) -> ProviderHealth {
        let endpoint = format!(
            "https://{}/api/v1/version",
            self.capabilities.hostnames[0]
        );
        let started = Instant::now();
        let result = self.request(&endpoint).send().await;
        #[allow(clippy::cast_possible_truncation)]
        let response_time_ms = started.elapsed().as_millis() as u64;

        let is_healthy = matches!(&result, Ok(resp) if resp.status().is_success());

        ProviderHealth {
            name: self.capabilities.name.clone(),
            is_healthy,
            response_time_ms,
            auth_valid: if self.auth.has_token() {
                match &result {
                    Ok(resp) => Some(resp.status().as_u16() != 401),
                    Err(_) => None,
                }
            } else {
                None
            },
        }
    }
}

impl GiteaProvider {
    async fn file_via_clone(&self, url: &str, path: &str) -> Result<String, VigilError> {
        let workdir = tempfile::tempdir()?;
        self.clone_repository(url, workdir.path(), &self.clone_options)
            .await?;
        std::fs::read_to_string(workdir.path().join(path)).map_err(|err| {
            VigilError::FileContent {
                path: path.to_string(),
                message: err.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GiteaProvider {
        GiteaProvider::new(AuthConfig::none(), 10, CloneOptions::default()).expect("provider")
    }

    #[test]
    fn test_codeberg_maps_to_codeberg_platform() {
        let reference = provider()
            .parse_url("https://codeberg.org/owner/repo")
            .expect("parses");
        assert_eq!(reference.platform, Platform::Codeberg);
    }

    #[test]
    fn test_gitea_com_maps_to_gitea_platform() {
        let reference = provider()
            .parse_url("https://gitea.com/owner/repo")
            .expect("parses");
        assert_eq!(reference.platform, Platform::Gitea);
    }

    #[test]
    fn test_forgejo_host_detection() {
        assert_eq!(platform_for_host("forgejo.example.org"), Platform::Forgejo);
        assert_eq!(platform_for_host("git.example.org"), Platform::Gitea);
    }

    #[test]
    fn test_custom_hostnames_are_claimed() {
        let provider = GiteaProvider::with_hostnames(
            AuthConfig::none(),
            10,
            CloneOptions::default(),
            vec!["git.internal.example".to_string()],
        )
        .expect("provider");
        assert!(provider.can_handle("https://git.internal.example/team/service"));
        assert!(!provider.can_handle("https://codeberg.org/owner/repo"));
    }
}
