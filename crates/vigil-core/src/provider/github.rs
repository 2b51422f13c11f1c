// SPDX-License-Identifier: Apache-2.0

//! GitHub provider adapter.
//!
//! Prefers the GitHub REST API via octocrab for commit resolution,
//! change comparison, metadata, and file content; every API path falls
//! back to the generic git implementation on failure. Transient API
//! errors are retried with exponential backoff before the fallback
//! engages.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use backon::Retryable;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::auth::AuthConfig;
use crate::error::VigilError;
use crate::provider::types::{
    ChangeDetection, ChangeSummary, CloneOptions, CommonMetadata, Platform, ProviderCapabilities,
    ProviderHealth, RepositoryMetadata, RepositoryReference, UNKNOWN_COMMIT,
};
use crate::provider::{GitProvider, commit_info_from_parts, parse_hosted_url};
use crate::retry::{is_retryable_octocrab, retry_backoff};

/// GitHub hosting adapter backed by octocrab.
pub struct GithubProvider {
    capabilities: ProviderCapabilities,
    auth: AuthConfig,
    client: octocrab::Octocrab,
    clone_options: CloneOptions,
}

impl GithubProvider {
    /// Creates a GitHub adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the octocrab client cannot be built.
    pub fn new(auth: AuthConfig, clone_options: CloneOptions) -> Result<Self, VigilError> {
        let mut builder = octocrab::OctocrabBuilder::new();
        if let Some(token) = auth.token.as_ref() {
            builder = builder.personal_token(token.expose_secret().to_string());
        }
        let client = builder.build()?;

        Ok(Self {
            capabilities: ProviderCapabilities {
                name: "github".to_string(),
                platform: Platform::GitHub,
                hostnames: vec!["github.com".to_string(), "www.github.com".to_string()],
                supports_private_repos: true,
                supports_api: true,
                auth_kind: auth.kind,
                rate_limit: Some(5000),
            },
            auth,
            client,
            clone_options,
        })
    }

    fn reference(&self, url: &str) -> Result<RepositoryReference, VigilError> {
        self.parse_url(url).ok_or_else(|| VigilError::InvalidUrl {
            url: url.to_string(),
        })
    }

    /// Latest commit on the default branch via the commits API.
    async fn head_via_api(&self, owner: &str, repo: &str) -> Result<String, octocrab::Error> {
        let route = format!("/repos/{owner}/{repo}/commits?per_page=1");
        let commits: serde_json::Value = (|| async {
            self.client.get(&route, None::<&()>).await
        })
        .retry(retry_backoff())
        .when(is_retryable_octocrab)
        .await?;

        Ok(commits
            .as_array()
            .and_then(|list| list.first())
            .and_then(|commit| commit.get("sha"))
            .and_then(|sha| sha.as_str())
            .unwrap_or(UNKNOWN_COMMIT)
            .to_string())
    }

    /// Two-commit comparison via the compare API.
    async fn compare_via_api(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<ChangeSummary, octocrab::Error> {
        let route = format!("/repos/{owner}/{repo}/compare/{base}...{head}");
        let comparison: serde_json::Value = (|| async {
            self.client.get(&route, None::<&()>).await
        })
        .retry(retry_backoff())
        .when(is_retryable_octocrab)
        .await?;

        let files = comparison
            .get("files")
            .and_then(|f| f.as_array())
            .cloned()
            .unwrap_or_default();
        let sum = |key: &str| {
            files
                .iter()
                .filter_map(|file| file.get(key).and_then(serde_json::Value::as_u64))
                .sum()
        };

        Ok(ChangeSummary {
            files_changed: files.len() as u64,
            additions: sum("additions"),
            deletions: sum("deletions"),
            commits: comparison
                .get("total_commits")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0),
        })
    }

    async fn metadata_via_api(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryMetadata, octocrab::Error> {
        let repository = (|| async { self.client.repos(owner, repo).get().await })
            .retry(retry_backoff())
            .when(is_retryable_octocrab)
            .await?;

        let route = format!("/repos/{owner}/{repo}/commits?per_page=1");
        let commits: serde_json::Value = self.client.get(&route, None::<&()>).await?;
        let head = commits.as_array().and_then(|list| list.first());
        let last_commit = commit_info_from_parts(
            head.and_then(|c| c.get("sha"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or(UNKNOWN_COMMIT),
            head.and_then(|c| c.pointer("/commit/committer/date"))
                .and_then(serde_json::Value::as_str),
            head.and_then(|c| c.pointer("/commit/message"))
                .and_then(serde_json::Value::as_str),
            head.and_then(|c| c.pointer("/commit/author/name"))
                .and_then(serde_json::Value::as_str),
        );

        let mut platform_specific = HashMap::new();
        if let Some(topics) = repository.topics.clone() {
            platform_specific.insert("topics".to_string(), serde_json::json!(topics));
        }
        if let Some(issues) = repository.open_issues_count {
            platform_specific.insert("open_issues".to_string(), serde_json::json!(issues));
        }

        Ok(RepositoryMetadata {
            name: repository.name.clone(),
            description: repository.description.clone(),
            default_branch: repository
                .default_branch
                .clone()
                .unwrap_or_else(|| "main".to_string()),
            last_commit,
            platform_specific,
            common: CommonMetadata {
                visibility: Some(if repository.private.unwrap_or(false) {
                    "private".to_string()
                } else {
                    "public".to_string()
                }),
                stars: repository.stargazers_count.map(u64::from),
                forks: repository.forks_count.map(u64::from),
                language: repository
                    .language
                    .as_ref()
                    .and_then(|lang| lang.as_str())
                    .map(ToString::to_string),
                license: repository
                    .license
                    .as_ref()
                    .map(|license| license.spdx_id.clone()),
            },
        })
    }
}

#[async_trait]
impl GitProvider for GithubProvider {
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
        parse_hosted_url(url, Platform::GitHub, &self.capabilities.hostnames)
    }

    async fn last_commit_hash(&self, url: &str) -> Result<String, VigilError> {
        let reference = self.reference(url)?;
        match self
            .head_via_api(&reference.owner, &reference.repository)
            .await
        {
            Ok(hash) => Ok(hash),
            Err(err) => {
                warn!(url, error = %err, "GitHub commits API failed, falling back to ls-remote");
                self.last_commit_via_git(url).await
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

        match self
            .compare_via_api(&reference.owner, &reference.repository, prior_hash, &current)
            .await
        {
            Ok(summary) if summary.is_empty() => {
                debug!(url, "Compare API reports an empty diff");
                ChangeDetection {
                    has_changes: false,
                    last_commit_hash: current,
                    summary: Some(summary),
                    error: None,
                }
            }
            Ok(summary) => ChangeDetection::changed(&current, Some(summary)),
            Err(err) => {
                warn!(url, error = %err, "GitHub compare API failed, assuming changes");
                ChangeDetection::unknown(&current, err.to_string())
            }
        }
    }

    async fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata, VigilError> {
        let reference = self.reference(url)?;
        match self
            .metadata_via_api(&reference.owner, &reference.repository)
            .await
        {
            Ok(metadata) => Ok(metadata),
            Err(err) => {
                warn!(url, error = %err, "GitHub metadata API failed, falling back to clone");
                self.metadata_via_git(url).await
            }
        }
    }

    async fn fetch_file(
        &self,
        url: &str,
        path: &str,
        reference: &str,
    ) -> Result<String, VigilError> {
        let repo_ref = self.reference(url)?;
        let content = self
            .client
            .repos(&repo_ref.owner, &repo_ref.repository)
            .get_content()
            .path(path)
            .r#ref(reference)
            .send()
            .await;

        match content {
            Ok(mut items) => items
                .items
                .pop()
                .and_then(|item| item.decoded_content())
                .ok_or_else(|| VigilError::FileContent {
                    path: path.to_string(),
                    message: "no decodable content in API response".to_string(),
                }),
            Err(err) => {
                warn!(url, path, error = %err, "GitHub contents API failed, falling back to clone");
                self.file_via_git(url, path).await
            }
        }
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = self.client.ratelimit().get().await;
        #[allow(clippy::cast_possible_truncation)]
        let response_time_ms = started.elapsed().as_millis() as u64;

        ProviderHealth {
            name: self.capabilities.name.clone(),
            is_healthy: result.is_ok(),
            response_time_ms,
            auth_valid: self
                .auth
                .has_token()
                .then_some(result.is_ok()),
        }
    }
}

impl GithubProvider {
    /// `ls-remote` fallback for commit resolution.
    async fn last_commit_via_git(&self, url: &str) -> Result<String, VigilError> {
        let authed = crate::auth::authenticated_clone_url(url, Platform::GitHub, &self.auth);
        let head = crate::gitcmd::ls_remote_head(&authed, self.clone_options.timeout_seconds).await?;
        Ok(head.unwrap_or_else(|| UNKNOWN_COMMIT.to_string()))
    }

    /// Clone-and-read fallback for file content.
    async fn file_via_git(&self, url: &str, path: &str) -> Result<String, VigilError> {
        let workdir = tempfile::tempdir()?;
        self.clone_repository(url, workdir.path(), &self.clone_options)
            .await?;
        let file_path = workdir.path().join(path);
        std::fs::read_to_string(&file_path).map_err(|err| VigilError::FileContent {
            path: path.to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GithubProvider {
        GithubProvider::new(AuthConfig::none(), CloneOptions::default()).expect("provider")
    }

    #[tokio::test]
    async fn test_can_handle_github_urls() {
        let provider = provider();
        assert!(provider.can_handle("https://github.com/rust-lang/cargo"));
        assert!(provider.can_handle("https://github.com/rust-lang/cargo.git"));
        assert!(!provider.can_handle("https://gitlab.com/group/project"));
        assert!(!provider.can_handle("not a url"));
    }

    #[tokio::test]
    async fn test_parse_url_builds_reference() {
        let reference = provider()
            .parse_url("https://github.com/rust-lang/cargo.git")
            .expect("parses");
        assert_eq!(reference.platform, Platform::GitHub);
        assert_eq!(reference.full_name, "rust-lang/cargo");
        assert_eq!(reference.original_url, "https://github.com/rust-lang/cargo.git");
    }

    #[tokio::test]
    async fn test_capabilities_shape() {
        let provider = provider();
        let capabilities = provider.capabilities();
        assert_eq!(capabilities.name, "github");
        assert!(capabilities.supports_api);
        assert!(capabilities.supports_private_repos);
        assert_eq!(capabilities.rate_limit, Some(5000));
    }
}
