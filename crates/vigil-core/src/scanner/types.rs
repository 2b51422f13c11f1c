// SPDX-License-Identifier: Apache-2.0

//! Normalized scanner output types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Normalized severity of a security finding.
///
/// Each scanner adapter maps its tool's taxonomy onto this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Issue requiring prompt attention.
    High,
    /// Issue that should be addressed.
    Medium,
    /// Minor issue.
    Low,
    /// Informational note, not a defect.
    #[default]
    Info,
}

impl Severity {
    /// Lowercase label for logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized security issue reported by a scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Tool rule identifier that produced the finding.
    pub rule_id: String,
    /// Human-readable description of the issue.
    pub message: String,
    /// Repository-relative file path.
    pub file_path: String,
    /// Line number in the file (1-indexed; 0 when unknown).
    pub line: u64,
    /// Normalized severity.
    pub severity: Severity,
    /// Name of the scanner adapter that produced the finding.
    pub scanner: String,
    /// Tool-specific extras, passed through untyped.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One scanner's contribution to a scan report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerReport {
    /// Scanner adapter name.
    pub scanner: String,
    /// Tool version string, when the tool reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Normalized findings. Empty when the scanner failed.
    pub findings: Vec<Finding>,
    /// Finding counts grouped by severity.
    pub severity_counts: HashMap<Severity, usize>,
    /// Failure note when the scanner errored; its findings are then
    /// empty and the overall scan still succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScannerReport {
    /// A successful contribution from `findings`.
    #[must_use]
    pub fn from_findings(scanner: &str, version: Option<String>, findings: Vec<Finding>) -> Self {
        let severity_counts = count_by_severity(&findings);
        Self {
            scanner: scanner.to_string(),
            version,
            findings,
            severity_counts,
            error: None,
        }
    }

    /// An isolated failure: empty findings plus the error note.
    #[must_use]
    pub fn from_error(scanner: &str, error: impl Into<String>) -> Self {
        Self {
            scanner: scanner.to_string(),
            version: None,
            findings: Vec::new(),
            severity_counts: HashMap::new(),
            error: Some(error.into()),
        }
    }
}

/// Groups findings into severity counts.
#[must_use]
pub fn count_by_severity(findings: &[Finding]) -> HashMap<Severity, usize> {
    let mut counts = HashMap::new();
    for finding in findings {
        *counts.entry(finding.severity).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            rule_id: "rule".to_string(),
            message: "message".to_string(),
            file_path: "src/lib.rs".to_string(),
            line: 1,
            severity,
            scanner: "test".to_string(),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn test_severity_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        assert_eq!(serde_json::to_string(&Severity::Info).unwrap(), "\"info\"");
    }

    #[test]
    fn test_count_by_severity() {
        let findings = vec![
            finding(Severity::High),
            finding(Severity::High),
            finding(Severity::Low),
        ];
        let counts = count_by_severity(&findings);
        assert_eq!(counts.get(&Severity::High), Some(&2));
        assert_eq!(counts.get(&Severity::Low), Some(&1));
        assert_eq!(counts.get(&Severity::Medium), None);
    }

    #[test]
    fn test_scanner_report_from_findings() {
        let report = ScannerReport::from_findings(
            "semgrep",
            Some("1.50.0".to_string()),
            vec![finding(Severity::Medium)],
        );
        assert_eq!(report.scanner, "semgrep");
        assert_eq!(report.findings.len(), 1);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_scanner_report_from_error_is_empty() {
        let report = ScannerReport::from_error("gitleaks", "binary not found");
        assert!(report.findings.is_empty());
        assert!(report.severity_counts.is_empty());
        assert_eq!(report.error.as_deref(), Some("binary not found"));
    }

    #[test]
    fn test_finding_serialization_roundtrip() {
        let mut extra = HashMap::new();
        extra.insert("cwe".to_string(), serde_json::json!("CWE-798"));
        let original = Finding {
            rule_id: "hardcoded-secret".to_string(),
            message: "Hardcoded credential".to_string(),
            file_path: "src/config.rs".to_string(),
            line: 42,
            severity: Severity::High,
            scanner: "patterns".to_string(),
            extra,
        };

        let json = serde_json::to_string(&original).expect("serialize");
        let parsed: Finding = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, parsed);
    }
}
