// SPDX-License-Identifier: Apache-2.0

//! Azure DevOps provider adapter.
//!
//! Repository URLs have the form
//! `https://dev.azure.com/{organization}/{project}/_git/{repository}`,
//! so parsing does not go through the shared owner/repo helper. The
//! adapter uses the Azure DevOps 7.1 REST API with PAT basic-auth and
//! the git fallback on any API failure.

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
use crate::provider::{GitProvider, commit_info_from_parts};

const API_VERSION: &str = "7.1";

/// Azure DevOps hosting adapter.
pub struct AzureDevOpsProvider {
    capabilities: ProviderCapabilities,
    auth: AuthConfig,
    http: reqwest::Client,
    clone_options: CloneOptions,
}

/// The organization/project/repository triple behind an Azure URL.
struct AzureCoordinates {
    organization: String,
    project: String,
    repository: String,
}

impl AzureDevOpsProvider {
    /// Creates an Azure DevOps adapter for dev.azure.com.
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
                name: "azure-devops".to_string(),
                platform: Platform::AzureDevOps,
                hostnames: vec!["dev.azure.com".to_string()],
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
            // PATs go in the basic-auth password slot; username is ignored.
            builder = builder.basic_auth("", Some(token.expose_secret()));
        }
        builder
    }

    fn coordinates(url: &str) -> Option<AzureCoordinates> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let (host, path) = rest.split_once('/')?;
        if host != "dev.azure.com" {
            return None;
        }

        let mut segments = path.trim_end_matches('/').split('/');
        let organization = segments.next().filter(|s| !s.is_empty())?;
        let project = segments.next().filter(|s| !s.is_empty())?;
        if segments.next() != Some("_git") {
            return None;
        }
        let repository = segments.next().filter(|s| !s.is_empty())?;

        Some(AzureCoordinates {
            organization: organization.to_string(),
            project: project.to_string(),
            repository: repository.trim_end_matches(".git").to_string(),
        })
    }

    fn repo_api_base(coordinates: &AzureCoordinates) -> String {
        format!(
            "https://dev.azure.com/{}/{}/_apis/git/repositories/{}",
            coordinates.organization, coordinates.project, coordinates.repository
        )
    }

    fn coordinates_for(&self, url: &str) -> Result<AzureCoordinates, VigilError> {
        Self::coordinates(url).ok_or_else(|| VigilError::InvalidUrl {
            url: url.to_string(),
        })
    }

    async fn head_via_api(
        &self,
        coordinates: &AzureCoordinates,
    ) -> Result<serde_json::Value, VigilError> {
        let endpoint = format!(
            "{}/commits?searchCriteria.$top=1&api-version={API_VERSION}",
            Self::repo_api_base(coordinates)
        );
        let page = rest::get_json("azure-devops", || self.request(&endpoint)).await?;
        Ok(page
            .pointer("/value/0")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl GitProvider for AzureDevOpsProvider {
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
        Self::coordinates(url).is_some()
    }

    fn parse_url(&self, url: &str) -> Option<RepositoryReference> {
        let coordinates = Self::coordinates(url)?;
        Some(RepositoryReference::new(
            url,
            Platform::AzureDevOps,
            "dev.azure.com",
            &format!("{}/{}", coordinates.organization, coordinates.project),
            &coordinates.repository,
        ))
    }

    async fn last_commit_hash(&self, url: &str) -> Result<String, VigilError> {
        let coordinates = self.coordinates_for(url)?;
        match self.head_via_api(&coordinates).await {
            Ok(head) => Ok(rest::str_field(&head, "/commitId")
                .unwrap_or_else(|| UNKNOWN_COMMIT.to_string())),
            Err(err) => {
                warn!(url, error = %err, "Azure DevOps commits API failed, falling back to ls-remote");
                let authed =
                    crate::auth::authenticated_clone_url(url, Platform::AzureDevOps, &self.auth);
                let head =
                    crate::gitcmd::ls_remote_head(&authed, self.clone_options.timeout_seconds)
                        .await?;
                Ok(head.unwrap_or_else(|| UNKNOWN_COMMIT.to_string()))
            }
        }
    }

    async fn changes_since(&self, url: &str, prior_hash: &str) -> ChangeDetection {
        let Ok(coordinates) = self.coordinates_for(url) else {
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
            "{}/diffs/commits?baseVersion={prior_hash}&baseVersionType=commit&targetVersion={current}&targetVersionType=commit&api-version={API_VERSION}",
            Self::repo_api_base(&coordinates)
        );
        match rest::get_json("azure-devops", || self.request(&endpoint)).await {
            Ok(diff) => {
                let change_counts = diff
                    .get("changeCounts")
                    .and_then(serde_json::Value::as_object)
                    .map(|counts| counts.values().filter_map(serde_json::Value::as_u64).sum())
                    .unwrap_or(0);
                let summary = ChangeSummary {
                    files_changed: change_counts,
                    additions: 0,
                    deletions: 0,
                    commits: rest::u64_field(&diff, "/aheadCount").unwrap_or(0),
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
                warn!(url, error = %err, "Azure DevOps diff API failed, assuming changes");
                ChangeDetection::unknown(&current, err.to_string())
            }
        }
    }

    async fn fetch_metadata(&self, url: &str) -> Result<RepositoryMetadata, VigilError> {
        let coordinates = self.coordinates_for(url)?;
        let endpoint = format!(
            "{}?api-version={API_VERSION}",
            Self::repo_api_base(&coordinates)
        );
        let repository = match rest::get_json("azure-devops", || self.request(&endpoint)).await {
            Ok(repository) => repository,
            Err(err) => {
                warn!(url, error = %err, "Azure DevOps repository API failed, falling back to clone");
                return self.metadata_via_git(url).await;
            }
        };

        let head = self.head_via_api(&coordinates).await.unwrap_or_default();
        let last_commit = commit_info_from_parts(
            rest::str_field(&head, "/commitId")
                .as_deref()
                .unwrap_or(UNKNOWN_COMMIT),
            rest::str_field(&head, "/committer/date").as_deref(),
            rest::str_field(&head, "/comment").as_deref(),
            rest::str_field(&head, "/author/name").as_deref(),
        );

        let mut platform_specific = HashMap::new();
        if let Some(project) = rest::str_field(&repository, "/project/name") {
            platform_specific.insert("project".to_string(), serde_json::json!(project));
        }
        if let Some(size) = rest::u64_field(&repository, "/size") {
            platform_specific.insert("size_bytes".to_string(), serde_json::json!(size));
        }

        Ok(RepositoryMetadata {
            name: rest::str_field(&repository, "/name")
                .unwrap_or_else(|| coordinates.repository.clone()),
            description: rest::str_field(&repository, "/project/description")
                .filter(|d| !d.is_empty()),
            default_branch: rest::str_field(&repository, "/defaultBranch")
                .map(|branch| branch.trim_start_matches("refs/heads/").to_string())
                .unwrap_or_else(|| "main".to_string()),
            last_commit,
            platform_specific,
            common: CommonMetadata {
                visibility: rest::str_field(&repository, "/project/visibility"),
                stars: None,
                forks: None,
                language: None,
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
        let coordinates = self.coordinates_for(url)?;
        let endpoint = format!(
            "{}/items?path=/{path}&versionDescriptor.version={reference}&versionDescriptor.versionType=commit&$format=text&api-version={API_VERSION}",
            Self::repo_api_base(&coordinates)
        );

        match self.request(&endpoint).send().await {
            Ok(resp) if resp.status().is_success() => Ok(resp.text().await?),
            Ok(resp) => {
                warn!(url, path, status = %resp.status(), "Azure DevOps items API failed, falling back to clone");
                self.file_via_clone(url, path).await
            }
            Err(err) => {
                warn!(url, path, error = %err, "Azure DevOps items API unreachable, falling back to clone");
                self.file_via_clone(url, path).await
            }
        }
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let result = self
            .request(&format!(
                "https://dev.azure.com/_apis/resourceAreas?api-version={API_VERSION}"
            ))
            .send()
            .await;
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

impl AzureDevOpsProvider {
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

    fn provider() -> AzureDevOpsProvider {
        AzureDevOpsProvider::new(AuthConfig::none(), 10, CloneOptions::default()).expect("provider")
    }

    #[test]
    fn test_can_handle_azure_urls() {
        let provider = provider();
        assert!(provider.can_handle("https://dev.azure.com/org/project/_git/repo"));
        assert!(!provider.can_handle("https://dev.azure.com/org/project/repo"));
        assert!(!provider.can_handle("https://github.com/owner/repo"));
    }

    #[test]
    fn test_parse_url_owner_includes_project() {
        let reference = provider()
            .parse_url("https://dev.azure.com/contoso/shipping/_git/api")
            .expect("parses");
        assert_eq!(reference.owner, "contoso/shipping");
        assert_eq!(reference.repository, "api");
        assert_eq!(reference.platform, Platform::AzureDevOps);
    }

    #[test]
    fn test_repo_api_base() {
        let coordinates = AzureDevOpsProvider::coordinates(
            "https://dev.azure.com/contoso/shipping/_git/api",
        )
        .expect("coordinates");
        assert_eq!(
            AzureDevOpsProvider::repo_api_base(&coordinates),
            "https://dev.azure.com/contoso/shipping/_apis/git/repositories/api"
        );
    }
}
