// SPDX-License-Identifier: Apache-2.0

//! Error types for the Vigil scan core.
//!
//! Uses `thiserror` for deriving `std::error::Error` implementations.
//! Application code should use `anyhow::Result` for top-level error handling.

use thiserror::Error;

/// Errors that can occur during Vigil operations.
#[derive(Error, Debug)]
pub enum VigilError {
    /// No registered provider can handle the given repository URL.
    #[error("No suitable provider found for repository URL: {url}")]
    NoProvider {
        /// The URL that failed resolution.
        url: String,
    },

    /// The URL does not parse as a repository reference.
    #[error("Invalid repository URL: {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },

    /// Hosting-platform API error after retries were exhausted.
    #[error("{platform} API error: {message}")]
    Provider {
        /// Platform name (e.g., `github`, `gitlab`).
        platform: String,
        /// Error message from the platform API.
        message: String,
        /// Optional HTTP status code from the platform.
        status: Option<u16>,
    },

    /// Cloning the repository failed and no fallback remains.
    #[error("Failed to clone repository {url}: {message}")]
    Clone {
        /// Repository URL.
        url: String,
        /// Underlying failure description.
        message: String,
    },

    /// Metadata could not be fetched via the API nor derived from a clone.
    #[error("Failed to fetch metadata for {url}: {message}")]
    Metadata {
        /// Repository URL.
        url: String,
        /// Underlying failure description.
        message: String,
    },

    /// A clone or scanner invocation exceeded its wall-clock deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// The operation that timed out (e.g., `git clone`, `semgrep`).
        operation: String,
        /// The deadline that was exceeded, in seconds.
        seconds: u64,
    },

    /// A scanner tool failed. Isolated by the orchestrator, never terminal.
    #[error("Scanner {scanner} failed: {message}")]
    Scanner {
        /// Scanner adapter name.
        scanner: String,
        /// Tool-specific failure description.
        message: String,
    },

    /// A git subprocess exited unsuccessfully.
    #[error("git {operation} failed: {message}")]
    Git {
        /// The git subcommand that failed.
        operation: String,
        /// Captured stderr, trimmed.
        message: String,
    },

    /// The requested file or line range does not exist in the repository.
    #[error("File content error for {path}: {message}")]
    FileContent {
        /// Repository-relative file path.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// Configuration file error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Network/HTTP error from reqwest.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<octocrab::Error> for VigilError {
    fn from(err: octocrab::Error) -> Self {
        let status = match &err {
            octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
            _ => None,
        };
        VigilError::Provider {
            platform: "github".to_string(),
            message: err.to_string(),
            status,
        }
    }
}

impl From<config::ConfigError> for VigilError {
    fn from(err: config::ConfigError) -> Self {
        VigilError::Config {
            message: err.to_string(),
        }
    }
}

impl VigilError {
    /// Whether this error aborts the scan pipeline.
    ///
    /// Only resolution, clone, metadata, and timeout failures are terminal;
    /// everything else degrades to a smaller result.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VigilError::NoProvider { .. }
                | VigilError::InvalidUrl { .. }
                | VigilError::Clone { .. }
                | VigilError::Metadata { .. }
                | VigilError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_provider_message_names_url() {
        let err = VigilError::NoProvider {
            url: "ftp://example.com/repo".to_string(),
        };
        assert!(err.to_string().contains("ftp://example.com/repo"));
    }

    #[test]
    fn test_timeout_message() {
        let err = VigilError::Timeout {
            operation: "git clone".to_string(),
            seconds: 300,
        };
        assert_eq!(err.to_string(), "git clone timed out after 300s");
    }

    #[test]
    fn test_terminal_classification() {
        assert!(
            VigilError::Clone {
                url: "u".to_string(),
                message: "m".to_string(),
            }
            .is_terminal()
        );
        assert!(
            !VigilError::Scanner {
                scanner: "semgrep".to_string(),
                message: "m".to_string(),
            }
            .is_terminal()
        );
        assert!(
            !VigilError::Git {
                operation: "ls-remote".to_string(),
                message: "m".to_string(),
            }
            .is_terminal()
        );
    }
}
