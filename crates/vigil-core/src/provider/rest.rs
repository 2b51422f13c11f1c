// SPDX-License-Identifier: Apache-2.0

//! Shared REST plumbing for the non-GitHub platform adapters.
//!
//! GitLab, Bitbucket, Azure DevOps, and the Gitea family all follow the
//! same shape: build an authenticated request, retry transient failures
//! with backoff, and extract fields from a loosely-typed JSON payload.

use std::time::Duration;

use backon::Retryable;
use serde_json::Value;

use crate::error::VigilError;
use crate::retry::{is_retryable_http, retry_backoff};

/// Builds a reqwest client with the platform API timeout applied.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn api_client(timeout_seconds: u64) -> Result<reqwest::Client, VigilError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Whether a [`VigilError`] from a REST call is worth retrying.
#[must_use]
pub fn is_retryable(err: &VigilError) -> bool {
    match err {
        VigilError::Network(req_err) => {
            req_err.is_timeout()
                || req_err.is_connect()
                || req_err
                    .status()
                    .is_some_and(|status| is_retryable_http(status.as_u16()))
        }
        VigilError::Provider { status, .. } => {
            status.is_some_and(is_retryable_http)
        }
        _ => false,
    }
}

/// Performs a GET expecting a JSON payload, retrying transient failures.
///
/// `build` is invoked once per attempt so each retry gets a fresh
/// request. Non-2xx responses become [`VigilError::Provider`] carrying
/// the status code.
///
/// # Errors
///
/// Returns the final error once the retry budget is exhausted.
pub async fn get_json<F>(platform: &str, build: F) -> Result<Value, VigilError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let platform = platform.to_string();
    (|| async {
        let response = build().send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VigilError::Provider {
                platform: platform.clone(),
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    format!("HTTP {status}: {body}")
                },
                status: Some(status.as_u16()),
            });
        }
        Ok(response.json::<Value>().await?)
    })
    .retry(retry_backoff())
    .when(is_retryable)
    .await
}

/// Reads a string field from a JSON payload.
#[must_use]
pub fn str_field(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Reads an unsigned integer field from a JSON payload.
#[must_use]
pub fn u64_field(value: &Value, pointer: &str) -> Option<u64> {
    value.pointer(pointer).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_provider_status() {
        assert!(is_retryable(&VigilError::Provider {
            platform: "gitlab".to_string(),
            message: "HTTP 503".to_string(),
            status: Some(503),
        }));
        assert!(!is_retryable(&VigilError::Provider {
            platform: "gitlab".to_string(),
            message: "HTTP 404".to_string(),
            status: Some(404),
        }));
        assert!(!is_retryable(&VigilError::Provider {
            platform: "gitlab".to_string(),
            message: "no status".to_string(),
            status: None,
        }));
    }

    #[test]
    fn test_is_retryable_ignores_other_variants() {
        assert!(!is_retryable(&VigilError::Config {
            message: "bad".to_string(),
        }));
    }

    #[test]
    fn test_json_field_helpers() {
        let value = serde_json::json!({
            "a": {"b": "text", "n": 7},
        });
        assert_eq!(str_field(&value, "/a/b").as_deref(), Some("text"));
        assert_eq!(u64_field(&value, "/a/n"), Some(7));
        assert_eq!(str_field(&value, "/missing"), None);
    }
}
