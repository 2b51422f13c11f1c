// SPDX-License-Identifier: Apache-2.0

//! Gitleaks scanner adapter.
//!
//! Runs `gitleaks` in filesystem mode against the checked-out tree and
//! normalizes its JSON report. Every leak is a high-severity finding;
//! the matched secret itself is never carried into the report.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::VigilError;
use crate::scanner::exec::{probe_version, run_tool};
use crate::scanner::types::{Finding, Severity};
use crate::scanner::Scanner;

/// Gitleaks CLI adapter.
pub struct GitleaksScanner {
    timeout_seconds: u64,
}

impl GitleaksScanner {
    /// Creates a gitleaks adapter.
    #[must_use]
    pub fn new(timeout_seconds: u64) -> Self {
        Self { timeout_seconds }
    }

    /// Parses gitleaks' JSON report into findings.
    ///
    /// Paths in the report are absolute within the scanned tree and get
    /// rewritten repository-relative.
    fn parse_report(&self, raw: &str, root: &Path) -> Result<Vec<Finding>, VigilError> {
        let leaks: Vec<serde_json::Value> =
            serde_json::from_str(raw).map_err(|err| VigilError::Scanner {
                scanner: self.name().to_string(),
                message: format!("unparseable JSON output: {err}"),
            })?;

        let root_str = root.to_string_lossy();
        Ok(leaks
            .iter()
            .map(|leak| {
                let file = leak
                    .get("File")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default();
                let relative = file
                    .strip_prefix(root_str.as_ref())
                    .map(|rest| rest.trim_start_matches('/'))
                    .unwrap_or(file);

                let mut extra = HashMap::new();
                if let Some(entropy) = leak.get("Entropy") {
                    extra.insert("entropy".to_string(), entropy.clone());
                }

                Finding {
                    rule_id: leak
                        .get("RuleID")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("gitleaks-rule")
                        .to_string(),
                    message: leak
                        .get("Description")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("Potential secret detected")
                        .to_string(),
                    file_path: relative.to_string(),
                    line: leak
                        .get("StartLine")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(0),
                    severity: Severity::High,
                    scanner: self.name().to_string(),
                    extra,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Scanner for GitleaksScanner {
    fn name(&self) -> &str {
        "gitleaks"
    }

    async fn version(&self) -> Option<String> {
        probe_version("gitleaks").await
    }

    async fn scan(&self, path: &Path) -> Result<Vec<Finding>, VigilError> {
        let source = path.to_string_lossy().to_string();
        let output = run_tool(
            "gitleaks",
            &[
                "detect",
                "--no-git",
                "--source",
                &source,
                "--report-format",
                "json",
                "--report-path",
                "/dev/stdout",
                "--exit-code",
                "0",
            ],
            None,
            self.timeout_seconds,
        )
        .await?;

        if !output.success() {
            return Err(VigilError::Scanner {
                scanner: self.name().to_string(),
                message: format!(
                    "exit {:?}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            });
        }

        let body = output.stdout.trim();
        if body.is_empty() {
            return Ok(Vec::new());
        }
        self.parse_report(body, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_relativizes_paths() {
        let scanner = GitleaksScanner::new(300);
        let raw = r#"[
            {
                "RuleID": "aws-access-key",
                "Description": "AWS access key",
                "File": "/tmp/workdir/src/deploy.sh",
                "StartLine": 12,
                "Entropy": 4.2
            }
        ]"#;

        let findings = scanner
            .parse_report(raw, Path::new("/tmp/workdir"))
            .expect("parses");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file_path, "src/deploy.sh");
        assert_eq!(findings[0].line, 12);
        assert_eq!(findings[0].severity, Severity::High);
        assert!(findings[0].extra.contains_key("entropy"));
    }

    #[test]
    fn test_parse_report_empty_array() {
        let scanner = GitleaksScanner::new(300);
        let findings = scanner
            .parse_report("[]", Path::new("/tmp/workdir"))
            .expect("parses");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_parse_report_rejects_non_json() {
        let scanner = GitleaksScanner::new(300);
        assert!(
            scanner
                .parse_report("oops", Path::new("/tmp/workdir"))
                .is_err()
        );
    }
}
