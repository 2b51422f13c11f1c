// SPDX-License-Identifier: Apache-2.0

//! Semgrep scanner adapter.
//!
//! Invokes the `semgrep` CLI with JSON output and normalizes its
//! results. Semgrep's ERROR/WARNING/INFO taxonomy maps onto
//! high/medium/info.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::VigilError;
use crate::scanner::exec::{probe_version, run_tool};
use crate::scanner::types::{Finding, Severity};
use crate::scanner::Scanner;

/// Semgrep CLI adapter.
pub struct SemgrepScanner {
    /// Ruleset passed to `--config` (default `auto`).
    config: String,
    timeout_seconds: u64,
}

impl SemgrepScanner {
    /// Creates a semgrep adapter with the default `auto` ruleset.
    #[must_use]
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            config: "auto".to_string(),
            timeout_seconds,
        }
    }

    /// Creates a semgrep adapter with an explicit ruleset.
    #[must_use]
    pub fn with_config(config: &str, timeout_seconds: u64) -> Self {
        Self {
            config: config.to_string(),
            timeout_seconds,
        }
    }

    fn normalize_severity(raw: &str) -> Severity {
        match raw.to_ascii_uppercase().as_str() {
            "ERROR" | "CRITICAL" | "HIGH" => Severity::High,
            "WARNING" | "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Info,
        }
    }

    /// Parses semgrep's JSON report into findings.
    fn parse_report(&self, raw: &str) -> Result<Vec<Finding>, VigilError> {
        let report: serde_json::Value =
            serde_json::from_str(raw).map_err(|err| VigilError::Scanner {
                scanner: self.name().to_string(),
                message: format!("unparseable JSON output: {err}"),
            })?;

        let results = report
            .get("results")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(results
            .iter()
            .map(|result| {
                let mut extra = HashMap::new();
                if let Some(cwe) = result.pointer("/extra/metadata/cwe") {
                    extra.insert("cwe".to_string(), cwe.clone());
                }
                if let Some(end_line) = result.pointer("/end/line") {
                    extra.insert("end_line".to_string(), end_line.clone());
                }

                Finding {
                    rule_id: result
                        .get("check_id")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("semgrep-rule")
                        .to_string(),
                    message: result
                        .pointer("/extra/message")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("Semgrep finding")
                        .trim()
                        .to_string(),
                    file_path: result
                        .get("path")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    line: result
                        .pointer("/start/line")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(0),
                    severity: result
                        .pointer("/extra/severity")
                        .and_then(serde_json::Value::as_str)
                        .map_or(Severity::Info, Self::normalize_severity),
                    scanner: self.name().to_string(),
                    extra,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Scanner for SemgrepScanner {
    fn name(&self) -> &str {
        "semgrep"
    }

    async fn version(&self) -> Option<String> {
        probe_version("semgrep").await
    }

    async fn scan(&self, path: &Path) -> Result<Vec<Finding>, VigilError> {
        let output = run_tool(
            "semgrep",
            &[
                "scan",
                "--json",
                "--quiet",
                "--config",
                &self.config,
                ".",
            ],
            Some(path),
            self.timeout_seconds,
        )
        .await?;

        // Semgrep exits nonzero for findings and for scan errors alike;
        // a JSON report on stdout is the success signal.
        if output.stdout.trim().is_empty() {
            return Err(VigilError::Scanner {
                scanner: self.name().to_string(),
                message: format!(
                    "no report produced (exit {:?}): {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        self.parse_report(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REPORT: &str = r#"{
        "results": [
            {
                "check_id": "rust.lang.security.insecure-hash",
                "path": "src/auth.rs",
                "start": {"line": 17},
                "end": {"line": 17},
                "extra": {
                    "message": "MD5 is a weak hash function",
                    "severity": "ERROR",
                    "metadata": {"cwe": ["CWE-328"]}
                }
            },
            {
                "check_id": "generic.secrets.gitleaks",
                "path": "config/settings.py",
                "start": {"line": 3},
                "extra": {"message": "Possible secret", "severity": "WARNING"}
            }
        ],
        "errors": []
    }"#;

    #[test]
    fn test_parse_report_normalizes_findings() {
        let scanner = SemgrepScanner::new(300);
        let findings = scanner.parse_report(SAMPLE_REPORT).expect("parses");

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].rule_id, "rust.lang.security.insecure-hash");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].file_path, "src/auth.rs");
        assert_eq!(findings[0].line, 17);
        assert_eq!(findings[0].scanner, "semgrep");
        assert!(findings[0].extra.contains_key("cwe"));

        assert_eq!(findings[1].severity, Severity::Medium);
    }

    #[test]
    fn test_parse_report_empty_results() {
        let scanner = SemgrepScanner::new(300);
        let findings = scanner
            .parse_report(r#"{"results": [], "errors": []}"#)
            .expect("parses");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_parse_report_rejects_non_json() {
        let scanner = SemgrepScanner::new(300);
        let err = scanner.parse_report("semgrep: command crashed").expect_err("rejects");
        assert!(matches!(err, VigilError::Scanner { .. }));
    }

    #[test]
    fn test_severity_normalization() {
        assert_eq!(SemgrepScanner::normalize_severity("ERROR"), Severity::High);
        assert_eq!(SemgrepScanner::normalize_severity("warning"), Severity::Medium);
        assert_eq!(SemgrepScanner::normalize_severity("INFO"), Severity::Info);
        assert_eq!(SemgrepScanner::normalize_severity("whatever"), Severity::Info);
    }
}
