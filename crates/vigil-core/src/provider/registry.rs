// SPDX-License-Identifier: Apache-2.0

//! Ordered provider registry with first-match URL resolution.
//!
//! Adapters are registered in order of specificity: host-specific
//! adapters first, the generic git-protocol adapter last. Resolution is
//! a linear scan returning the first adapter whose `can_handle` accepts
//! the URL, which makes precedence deterministic and easy to test by
//! registering adapters in a controlled order.

use std::sync::Arc;

use tracing::debug;

use crate::auth::AuthConfig;
use crate::config::AppConfig;
use crate::error::VigilError;
use crate::provider::GitProvider;
use crate::provider::azure::AzureDevOpsProvider;
use crate::provider::bitbucket::BitbucketProvider;
use crate::provider::git::GenericGitProvider;
use crate::provider::gitea::GiteaProvider;
use crate::provider::github::GithubProvider;
use crate::provider::gitlab::GitlabProvider;
use crate::provider::types::{CloneOptions, Platform, ProviderCapabilities, ProviderHealth};

/// Ordered collection of hosting-provider adapters.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn GitProvider>>,
}

impl ProviderRegistry {
    /// An empty registry. Adapters must be registered in precedence order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter at the end of the precedence order.
    pub fn register(&mut self, provider: Arc<dyn GitProvider>) {
        debug!(provider = %provider.capabilities().name, "Registering provider");
        self.providers.push(provider);
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolves the adapter for a URL: first registered match wins.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::NoProvider`] when no adapter claims the URL.
    pub fn provider_for(&self, url: &str) -> Result<Arc<dyn GitProvider>, VigilError> {
        self.providers
            .iter()
            .find(|provider| provider.can_handle(url))
            .cloned()
            .ok_or_else(|| VigilError::NoProvider {
                url: url.to_string(),
            })
    }

    /// Capability descriptions of every registered adapter, in
    /// precedence order.
    #[must_use]
    pub fn capabilities(&self) -> Vec<ProviderCapabilities> {
        self.providers
            .iter()
            .map(|provider| provider.capabilities().clone())
            .collect()
    }

    /// Probes every registered adapter's health concurrently.
    pub async fn health_report(&self) -> Vec<ProviderHealth> {
        let probes = self
            .providers
            .iter()
            .map(|provider| provider.health_check());
        futures::future::join_all(probes).await
    }

    /// Builds the standard adapter set with environment-resolved
    /// credentials: GitHub, GitLab, Bitbucket, Azure DevOps, the Gitea
    /// family, and the generic git fallback last.
    ///
    /// # Errors
    ///
    /// Returns an error if any adapter's HTTP client cannot be built.
    pub fn with_default_providers(config: &AppConfig) -> Result<Self, VigilError> {
        let api_timeout = config.providers.api_timeout_seconds;
        let clone_options = CloneOptions {
            depth: config.scan.clone_depth,
            timeout_seconds: config.scan.clone_timeout_seconds,
            branch: None,
        };

        let mut registry = Self::new();
        registry.register(Arc::new(GithubProvider::new(
            AuthConfig::from_env(Platform::GitHub),
            clone_options.clone(),
        )?));
        registry.register(Arc::new(GitlabProvider::new(
            AuthConfig::from_env(Platform::GitLab),
            api_timeout,
            clone_options.clone(),
        )?));
        registry.register(Arc::new(BitbucketProvider::new(
            AuthConfig::from_env(Platform::Bitbucket),
            api_timeout,
            clone_options.clone(),
        )?));
        registry.register(Arc::new(AzureDevOpsProvider::new(
            AuthConfig::from_env(Platform::AzureDevOps),
            api_timeout,
            clone_options.clone(),
        )?));
        registry.register(Arc::new(GiteaProvider::new(
            AuthConfig::from_env(Platform::Gitea),
            api_timeout,
            clone_options.clone(),
        )?));
        registry.register(Arc::new(GenericGitProvider::new(
            AuthConfig::from_env(Platform::GenericGit),
            clone_options,
        )));
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_registry() -> ProviderRegistry {
        ProviderRegistry::with_default_providers(&AppConfig::default()).expect("registry")
    }

    #[tokio::test]
    async fn test_default_registry_has_six_providers() {
        let registry = default_registry();
        assert_eq!(registry.len(), 6);
        // The generic fallback must come last.
        let capabilities = registry.capabilities();
        assert_eq!(capabilities.last().expect("providers").name, "generic-git");
    }

    #[tokio::test]
    async fn test_github_url_resolves_to_github_not_generic() {
        let registry = default_registry();
        let provider = registry
            .provider_for("https://github.com/rust-lang/cargo")
            .expect("resolves");
        assert_eq!(provider.capabilities().name, "github");
    }

    #[tokio::test]
    async fn test_unknown_host_resolves_to_generic_fallback() {
        let registry = default_registry();
        let provider = registry
            .provider_for("https://git.internal.example/team/service.git")
            .expect("resolves");
        assert_eq!(provider.capabilities().name, "generic-git");
    }

    #[tokio::test]
    async fn test_unmatchable_url_is_a_resolution_error() {
        let registry = default_registry();
        let err = registry
            .provider_for("not a repository url")
            .err()
            .expect("no provider");
        assert!(matches!(err, VigilError::NoProvider { .. }));
    }

    #[tokio::test]
    async fn test_registration_order_is_precedence_order() {
        // Register the generic adapter first; it then shadows the
        // GitHub adapter even for github.com URLs.
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(GenericGitProvider::new(
            AuthConfig::none(),
            CloneOptions::default(),
        )));
        registry.register(Arc::new(
            GithubProvider::new(AuthConfig::none(), CloneOptions::default()).expect("provider"),
        ));

        let provider = registry
            .provider_for("https://github.com/owner/repo")
            .expect("resolves");
        assert_eq!(provider.capabilities().name, "generic-git");
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.provider_for("https://github.com/a/b").is_err());
    }

    #[tokio::test]
    async fn test_capabilities_aggregate() {
        let registry = default_registry();
        let names: Vec<String> = registry
            .capabilities()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "github",
                "gitlab",
                "bitbucket",
                "azure-devops",
                "gitea",
                "generic-git"
            ]
        );
    }
}
