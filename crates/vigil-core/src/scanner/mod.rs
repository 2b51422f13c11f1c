// SPDX-License-Identifier: Apache-2.0

//! Scanner adapter trait and output aggregation.
//!
//! Each adapter wraps one external analysis tool (or the built-in
//! pattern engine) and normalizes its output into the common
//! [`Finding`] shape. Adapters are isolated by the orchestrator: a
//! failing adapter contributes an empty finding list and never aborts
//! the other adapters or the pipeline.

use std::path::Path;

use async_trait::async_trait;

use crate::error::VigilError;

pub mod exec;
pub mod gitleaks;
pub mod patterns;
pub mod semgrep;
pub mod types;

use types::Finding;

/// An external security-analysis tool integration.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Adapter name, used as the `scanner` field on findings.
    fn name(&self) -> &str;

    /// Tool version, when the underlying binary is available and
    /// reports one. `None` for unavailable tools.
    async fn version(&self) -> Option<String>;

    /// Scans a checked-out working directory and returns normalized
    /// findings.
    ///
    /// The working directory is shared read-only with other adapters
    /// running concurrently and must not be mutated.
    ///
    /// # Errors
    ///
    /// Tool-specific failures surface as [`VigilError::Scanner`] (or
    /// [`VigilError::Timeout`] for deadline expiry); the orchestrator
    /// converts either into an empty contribution plus a warning.
    async fn scan(&self, path: &Path) -> Result<Vec<Finding>, VigilError>;
}
