// SPDX-License-Identifier: Apache-2.0

//! CLI-specific error formatting with user-friendly hints.
//!
//! Downcasts `anyhow::Error` to `VigilError` and adds actionable hints
//! for the common failure modes, keeping structured error data in the
//! library and presentation here.

use std::fmt::Write;

use anyhow::Error;
use vigil_core::{Platform, VigilError};

/// Formats an error for CLI display with helpful hints.
#[must_use]
pub fn format_error(error: &Error) -> String {
    let Some(vigil_err) = error.downcast_ref::<VigilError>() else {
        return format!("{error:#}");
    };

    match vigil_err {
        VigilError::NoProvider { url } => format!(
            "No suitable provider found for: {url}\n\n\
             Tip: supported hosts are github.com, gitlab.com, bitbucket.org,\n\
             dev.azure.com, gitea.com, codeberg.org, and any plain git remote\n\
             (https://, git://, or git@host:path)."
        ),
        VigilError::Provider {
            platform,
            message,
            status,
        } => {
            let mut msg = format!("{platform} API error: {message}");
            if let Some(code) = status {
                let _ = write!(msg, " (HTTP {code})");
            }
            if matches!(status, Some(401 | 403)) {
                let token_env = token_env_for(platform);
                let _ = write!(msg, "\n\nTip: check your {token_env} environment variable.");
            }
            msg
        }
        VigilError::Timeout { operation, seconds } => format!(
            "{operation} timed out after {seconds}s\n\n\
             Tip: raise the limit via VIGIL_SCAN__SCANNER_TIMEOUT_SECONDS or\n\
             VIGIL_SCAN__CLONE_TIMEOUT_SECONDS."
        ),
        VigilError::Config { .. } => format!(
            "{vigil_err}\n\nTip: check your config file at {}",
            vigil_core::config_file_path().display()
        ),
        other => other.to_string(),
    }
}

/// Maps a platform label to its token environment variable.
fn token_env_for(platform: &str) -> &'static str {
    match platform {
        "gitlab" => Platform::GitLab.token_env(),
        "bitbucket" => Platform::Bitbucket.token_env(),
        "azure-devops" => Platform::AzureDevOps.token_env(),
        "gitea" | "forgejo" | "codeberg" => Platform::Gitea.token_env(),
        _ => Platform::GitHub.token_env(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_provider_hint_lists_hosts() {
        let err = anyhow::anyhow!(VigilError::NoProvider {
            url: "ftp://example".to_string(),
        });
        let formatted = format_error(&err);
        assert!(formatted.contains("github.com"));
        assert!(formatted.contains("codeberg.org"));
    }

    #[test]
    fn test_auth_failure_names_token_env() {
        let err = anyhow::anyhow!(VigilError::Provider {
            platform: "gitlab".to_string(),
            message: "unauthorized".to_string(),
            status: Some(401),
        });
        let formatted = format_error(&err);
        assert!(formatted.contains("GITLAB_TOKEN"));
    }

    #[test]
    fn test_non_vigil_error_passes_through() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(format_error(&err), "something else");
    }
}
