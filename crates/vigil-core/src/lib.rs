// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # Vigil Core
//!
//! Core library for Vigil - repository security scan orchestration.
//!
//! This crate provides reusable components for:
//! - Hosting-provider abstraction over GitHub, GitLab, Bitbucket,
//!   Azure DevOps, the Gitea family, and plain git remotes
//! - Change detection deciding whether a repeat scan can be skipped
//! - An in-memory result cache with TTL expiry and capacity eviction
//! - Per-repository scan history with aggregate statistics
//! - A multi-scanner pipeline normalizing heterogeneous tool output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil_core::{Orchestrator, load_config};
//! use anyhow::Result;
//!
//! # async fn example() -> Result<()> {
//! // Load configuration and wire the standard components
//! let config = load_config()?;
//! let orchestrator = Orchestrator::with_defaults(&config)?;
//!
//! // Scan a repository (cache and change detection apply)
//! let report = orchestrator
//!     .scan_repository("https://github.com/owner/repo", false)
//!     .await?;
//! println!(
//!     "{} findings at commit {}",
//!     report.total_findings, report.commit_hash
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`provider`] - hosting-provider trait, adapters, and registry
//! - [`scanner`] - scanner adapter trait and tool integrations
//! - [`cache`] - scan result cache
//! - [`history`] - scan history store
//! - [`orchestrator`] - the scan pipeline and operation surface
//! - [`config`] - configuration loading and paths
//! - [`error`] - error types

// ============================================================================
// Error Handling
// ============================================================================

pub use error::VigilError;

/// Convenience Result type for Vigil operations.
///
/// This is equivalent to `std::result::Result<T, VigilError>`.
pub type Result<T> = std::result::Result<T, VigilError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    AppConfig, CacheConfig, ProvidersConfig, ScanConfig, config_dir, config_file_path,
    load_config,
};

// ============================================================================
// Authentication
// ============================================================================

pub use auth::{AuthConfig, AuthKind};

// ============================================================================
// Providers
// ============================================================================

pub use provider::GitProvider;
pub use provider::registry::ProviderRegistry;
pub use provider::types::{
    ChangeDetection, ChangeSummary, CloneOptions, CommitInfo, CommonMetadata, Platform,
    ProviderCapabilities, ProviderHealth, RepositoryMetadata, RepositoryReference, UNKNOWN_COMMIT,
};

// ============================================================================
// Scanners
// ============================================================================

pub use scanner::Scanner;
pub use scanner::types::{Finding, ScannerReport, Severity};

// ============================================================================
// Caching
// ============================================================================

pub use cache::{CacheEntry, CacheStats, ScanCache};

// ============================================================================
// History Tracking
// ============================================================================

pub use history::{
    HistoryStatistics, ScanHistoryEntry, ScanHistoryStore, ScanRecord, ScanUpdate,
};

// ============================================================================
// Reports and Orchestration
// ============================================================================

pub use orchestrator::{CodeContext, Orchestrator};
pub use report::{ScanReport, ScanStatus};

// ============================================================================
// Retry Logic
// ============================================================================

pub use retry::{is_retryable_anyhow, is_retryable_http, retry_backoff};

// ============================================================================
// Modules
// ============================================================================

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod gitcmd;
pub mod history;
pub mod orchestrator;
pub mod provider;
pub mod report;
pub mod retry;
pub mod scanner;
