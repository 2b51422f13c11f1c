// SPDX-License-Identifier: Apache-2.0

//! Bitbucket Cloud provider adapter.
//!
//! Uses the Bitbucket 2.0 REST API with the git fallback on any API
//! failure. Change detection uses the diffstat endpoint, which reports
//! per-file line counts but no commit totals.

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

const API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Bitbucket Cloud hosting adapter.
pub struct BitbucketProvider {
    capabilities: ProviderCapabilities,
    auth: AuthConfig,
    http: reqwest::Client,
    clone_options: CloneOptions,
}

impl BitbucketProvider {
    /// Creates a Bitbucket adapter for bitbucket.org.
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
                name: "bitbucket".to_string(),
                platform: Platform::Bitbucket,
                hostnames: vec!["bitbucket.org".to_string(), "www.bitbucket.org".to_string()],
                supports_private_repos: true,
                supports_api: true,
                auth_kind: auth.kind,
                rate_limit: Some(1000),
            },
            auth,
            http: rest::api_client(api_timeout_seconds)?,
            clone_options,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(url);
        if let Some(token) = self.auth.token.as_ref() {
            builder = builder.bearer_auth(token.expose_secret());
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
            "{API_BASE}/repositories/{}/commits?pagelen=1",
            reference.full_name
        );
        let page = rest::get_json("bitbucket", || self.request(&endpoint)).await?;
        Ok(page
            .pointer("/values/0")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl GitProvider for BitbucketProvider {
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
        parse_hosted_url(url, Platform::Bitbucket, &self.capabilities.hostnames)
    }

    async fn last_commit_hash(&self, url: &str) -> Result<String, VigilError> {
        let reference = self.reference(url)?;
        match self.head_via_api(&reference).await {
            Ok(head) => Ok(rest::str_field(&head, "/hash")
                .unwrap_or_else(|| UNKNOWN_COMMIT.to_string())),
            Err(err) => {
                warn!(url, error = %err, "Bitbucket commits API failed, falling back to ls-remote");
                let authed =
                    crate::auth::authenticated_clone_url(url, Platform::Bitbucket, &self.auth);
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
            "{API_BASE}/repositories/{}/diffstat/{current}..{prior_hash}",
            reference.full_name
        );
        match rest::get_json("bitbucket", || self.request(&endpoint)).await {
            Ok(diffstat) => {
                let values = diffstat
                    .get("values")
                    .and_then(serde_json::Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let sum = |key: &str| {
                    values
                        .iter()
                        .filter_map(|entry| entry.get(key).and_then(serde_json::Value::as_u64))
                        .sum()
                };
                let summary = ChangeSummary {
                    files_changed: rest::u64_field(&diffstat, "/size")
                        .unwrap_or(values.len() as u64),
                    additions: sum("lines_added"),
                    deletions: sum("lines_removed"),
                    commits: 0,
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
                warn!(url, error = %err, "Bitbucket diffstat API failed, assuming changes");
                ChangeDetection::unknown(&current, err.to_string())
            }
        }
    }

    async fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata, VigilError> {
        let reference = self.reference(url)?;
        let endpoint = format!("{API_BASE}/repositories/{}", reference.full_name);
        let repository = match rest::get_json("bitbucket", || self.request(&endpoint)).await {
            Ok(repository) => repository,
            Err(err) => {
                warn!(url, error = %err, "Bitbucket repository API failed, falling back to clone");
                return self.metadata_via_git(url).await;
            }
        };

        let head = self.head_via_api(&reference).await.unwrap_or_default();
        let last_commit = commit_info_from_parts(
            rest::str_field(&head, "/hash")
                .as_deref()
                .unwrap_or(UNKNOWN_COMMIT),
            rest::str_field(&head, "/date").as_deref(),
            rest::str_field(&head, "/message").as_deref(),
            rest::str_field(&head, "/author/user/display_name")
                .or_else(|| rest::str_field(&head, "/author/raw"))
                .as_deref(),
        );

        let mut platform_specific = HashMap::new();
        if let Some(uuid) = rest::str_field(&repository, "/uuid") {
            platform_specific.insert("uuid".to_string(), serde_json::json!(uuid));
        }
        if let Some(size) = rest::u64_field(&repository, "/size") {
            platform_specific.insert("size_bytes".to_string(), serde_json::json!(size));
        }

        let is_private = repository
            .get("is_private")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        Ok(RepositoryMetadata {
            name: rest::str_field(&repository, "/name")
                .unwrap_or_else(|| reference.repository.clone()),
            description: rest::str_field(&repository, "/description").filter(|d| !d.is_empty()),
            default_branch: rest::str_field(&repository, "/mainbranch/name")
                .unwrap_or_else(|| "main".to_string()),
            last_commit,
            platform_specific,
            common: CommonMetadata {
                visibility: Some(if is_private { "private" } else { "public" }.to_string()),
                stars: None,
                forks: None,
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
            "{API_BASE}/repositories/{}/src/{reference}/{path}",
            repo_ref.full_name
        );

        match self.request(&endpoint).send().await {
            Ok(resp) if resp.status().is_success() => Ok(resp.text().await?),
            Ok(resp) => {
                warn!(url, path, status = %resp.status(), "Bitbucket src API failed, falling back to clone");
                self.file_via_clone(url, path).await
            }
            Err(err) => {
                warn!(url, path, error = %err, "Bitbucket src API unreachable, falling back to clone");
                self.file_via_clone(url, path).await
            }
        }
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = self
            .request(&format!("{API_BASE}/repositories?pagelen=1"))
            .send()
            .await;
        #[allow(clippy::cast_possible_truncation)]
        let response_time_ms = started.elapsed().as_millis() as u64;

        let is_healthy = matches!(&result, Ok(resp) if resp.status().is_success());
        let auth_valid = if self.auth.has_token() {
            match &result {
                Ok(resp) => Some(resp.status().as_u16() != 401),
                Err(_) => None,
            }
        } else {
            None
        };

        ProviderHealth {
            name: self.capabilities.name.clone(),
            is_healthy,
            response_time_ms,
            auth_valid,
        }
    }
}

impl BitbucketProvider {
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

    fn provider() -> BitbucketProvider {
        BitbucketProvider::new(AuthConfig::none(), 10, CloneOptions::default()).expect("provider")
    }

    #[test]
    fn test_can_handle_bitbucket_urls() {
        let provider = provider();
        assert!(provider.can_handle("https://bitbucket.org/team/repo"));
        assert!(!provider.can_handle("https://gitlab.com/group/project"));
    }

    #[test]
    fn test_parse_url_reference() {
        let reference = provider()
            .parse_url("https://bitbucket.org/team/repo.git")
            .expect("parses");
        assert_eq!(reference.platform, Platform::Bitbucket);
        assert_eq!(reference.full_name, "team/repo");
    }
}
