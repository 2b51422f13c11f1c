// SPDX-License-Identifier: Apache-2.0

//! GitLab provider adapter.
//!
//! Uses the GitLab REST API (v4) for commit resolution, compare-based
//! change detection, metadata, and raw file content, with the git
//! fallback on any API failure. Works against gitlab.com and
//! self-hosted instances sharing the hostname list.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
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

/// GitLab hosting adapter.
pub struct GitlabProvider {
    capabilities: ProviderCapabilities,
    auth: AuthConfig,
    http: reqwest::Client,
    clone_options: CloneOptions,
}

impl GitlabProvider {
    /// Creates a GitLab adapter for gitlab.com.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        auth: AuthConfig,
        api_timeout_seconds: u64,
        clone_options: CloneOptions,
    ) -> Result<Self, VigilError> {
        Ok(Self {
            capabilities: ProviderCapabilities {
                name: "gitlab".to_string(),
                platform: Platform::GitLab,
                hostnames: vec!["gitlab.com".to_string(), "www.gitlab.com".to_string()],
                supports_private_repos: true,
                supports_api: true,
                auth_kind: auth.kind,
                rate_limit: Some(2000),
            },
            auth,
            http: rest::api_client(api_timeout_seconds)?,
            clone_options,
        })
    }

    fn api_base(&self, reference: &RepositoryReference) -> String {
        let project = utf8_percent_encode(&reference.full_name, NON_ALPHANUMERIC);
        format!("https://{}/api/v4/projects/{project}", reference.hostname)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(url);
        if let Some(token) = self.auth.token.as_ref() {
            builder = builder.header("PRIVATE-TOKEN", token.expose_secret());
        }
        builder
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
        let endpoint = format!(
            "{}/repository/commits?per_page=1",
            self.api_base(reference)
        );
        let commits = rest::get_json("gitlab", || self.request(&endpoint)).await?;
        Ok(commits
            .as_array()
            .and_then(|list| list.first())
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl GitProvider for GitlabProvider {
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
        parse_hosted_url(url, Platform::GitLab, &self.capabilities.hostnames)
    }

    async fn last_commit_hash(&self, url: &str) -> Result<String, VigilError> {
        let reference = self.reference(url)?;
        match self.head_via_api(&reference).await {
            Ok(head) => Ok(rest::str_field(&head, "/id")
                .unwrap_or_else(|| UNKNOWN_COMMIT.to_string())),
            Err(err) => {
                warn!(url, error = %err, "GitLab commits API failed, falling back to ls-remote");
                let authed =
                    crate::auth::authenticated_clone_url(url, Platform::GitLab, &self.auth);
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
            "{}/repository/compare?from={prior_hash}&to={current}",
            self.api_base(&reference)
        );
        match rest::get_json("gitlab", || self.request(&endpoint)).await {
            Ok(comparison) => {
                let diffs = comparison
                    .get("diffs")
                    .and_then(serde_json::Value::as_array)
                    .map_or(0, Vec::len) as u64;
                let commits = comparison
                    .get("commits")
                    .and_then(serde_json::Value::as_array)
                    .map_or(0, Vec::len) as u64;
                // The compare payload carries per-file patches, not line
                // counts; files-changed and commit totals decide significance.
                let summary = ChangeSummary {
                    files_changed: diffs,
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
                warn!(url, error = %err, "GitLab compare API failed, assuming changes");
                ChangeDetection::unknown(&current, err.to_string())
            }
        }
    }

    async fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata, VigilError> {
        let reference = self.reference(url)?;
        let endpoint = self.api_base(&reference);
        let project = match rest::get_json("gitlab", || self.request(&endpoint)).await {
            Ok(project) => project,
            Err(err) => {
                warn!(url, error = %err, "GitLab project API failed, falling back to clone");
                return self.metadata_via_git(url).await;
            }
        };

        let head = self.head_via_api(&reference).await.unwrap_or_default();
        let last_commit = commit_info_from_parts(
            rest::str_field(&head, "/id")
                .as_deref()
                .unwrap_or(UNKNOWN_COMMIT),
            rest::str_field(&head, "/committed_date").as_deref(),
            rest::str_field(&head, "/title").as_deref(),
            rest::str_field(&head, "/author_name").as_deref(),
        );

        let mut platform_specific = HashMap::new();
        if let Some(namespace) = rest::str_field(&project, "/namespace/kind") {
            platform_specific.insert("namespace_kind".to_string(), serde_json::json!(namespace));
        }
        if let Some(issues) = rest::u64_field(&project, "/open_issues_count") {
            platform_specific.insert("open_issues".to_string(), serde_json::json!(issues));
        }

        Ok(RepositoryMetadata {
            name: rest::str_field(&project, "/path")
                .unwrap_or_else(|| reference.repository.clone()),
            description: rest::str_field(&project, "/description").filter(|d| !d.is_empty()),
            default_branch: rest::str_field(&project, "/default_branch")
                .unwrap_or_else(|| "main".to_string()),
            last_commit,
            platform_specific,
            common: CommonMetadata {
                visibility: rest::str_field(&project, "/visibility"),
                stars: rest::u64_field(&project, "/star_count"),
                forks: rest::u64_field(&project, "/forks_count"),
                language: None,
                license: rest::str_field(&project, "/license/key"),
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
        let encoded_path = utf8_percent_encode(path, NON_ALPHANUMERIC);
        let endpoint = format!(
            "{}/repository/files/{encoded_path}/raw?ref={reference}",
            self.api_base(&repo_ref)
        );

        let response = self.request(&endpoint).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => Ok(resp.text().await?),
            Ok(resp) => {
                warn!(url, path, status = %resp.status(), "GitLab raw file API failed, falling back to clone");
                self.file_via_clone(url, path).await
            }
            Err(err) => {
                warn!(url, path, error = %err, "GitLab raw file API unreachable, falling back to clone");
                self.file_via_clone(url, path).await
            }
        }
    }

    async fn health_check(&self) -> ProviderHealth {
        let endpoint = format!(
            "https://{}/api/v4/version",
            self.capabilities.hostnames[0]
        );
        let started = Instant::now();
        let result = self.request(&endpoint).send().await;
        #[allow(clippy::cast_possible_truncation)]
        let response_time_ms = started.elapsed().as_millis() as u64;

        let (is_healthy, auth_valid) = match result {
            // /version requires authentication; 401 still proves the host is up.
            Ok(resp) if resp.status().is_success() => (true, Some(true)),
            Ok(resp) if resp.status().as_u16() == 401 => (true, Some(false)),
            Ok(_) | Err(_) => (false, None),
        };

        ProviderHealth {
            name: self.capabilities.name.clone(),
            is_healthy,
            response_time_ms,
            auth_valid: if self.auth.has_token() {
                auth_valid
            } else {
                None
            },
        }
    }
}

impl GitlabProvider {
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

    fn provider() -> GitlabProvider {
        GitlabProvider::new(AuthConfig::none(), 10, CloneOptions::default()).expect("provider")
    }

    #[test]
    fn test_can_handle_gitlab_urls() {
        let provider = provider();
        assert!(provider.can_handle("https://gitlab.com/group/project"));
        assert!(!provider.can_handle("https://github.com/owner/repo"));
    }

    #[test]
    fn test_api_base_percent_encodes_project_path() {
        let provider = provider();
        let reference = provider
            .parse_url("https://gitlab.com/group/project")
            .expect("parses");
        assert_eq!(
            provider.api_base(&reference),
            "https://gitlab.com/api/v4/projects/group%2Fproject"
        );
    }

    #[test]
    fn test_capabilities_shape() {
        let provider = provider();
        assert_eq!(provider.capabilities().platform, Platform::GitLab);
        assert!(provider.capabilities().supports_api);
    }
}
