// SPDX-License-Identifier: Apache-2.0

//! Bounded-lifetime invocation of external scan tools.
//!
//! Mirrors the git subprocess handling: hard wall-clock deadline,
//! forced termination on expiry, buffered stdout/stderr capture. Unlike
//! git, a nonzero exit is not inherently an error here; tools such as
//! semgrep exit nonzero when they find issues, so callers get the raw
//! output and decide.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::VigilError;

/// Captured output of one tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Process exit code; `None` when terminated by signal.
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    /// Whether the process exited zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external tool with a wall-clock deadline.
///
/// The child is spawned with `kill_on_drop`, so deadline expiry
/// forcibly terminates it rather than abandoning it.
///
/// # Errors
///
/// Returns [`VigilError::Timeout`] when the deadline expires and
/// [`VigilError::Scanner`] when the binary cannot be spawned (missing
/// tool, permission).
pub async fn run_tool(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout_seconds: u64,
) -> Result<ToolOutput, VigilError> {
    debug!(program, timeout_seconds, "Running scan tool");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|err| VigilError::Scanner {
        scanner: program.to_string(),
        message: format!("failed to spawn: {err}"),
    })?;

    let deadline = Duration::from_secs(timeout_seconds);
    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(output) => output.map_err(|err| VigilError::Scanner {
            scanner: program.to_string(),
            message: err.to_string(),
        })?,
        Err(_) => {
            return Err(VigilError::Timeout {
                operation: program.to_string(),
                seconds: timeout_seconds,
            });
        }
    };

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
    })
}

/// Probes a tool's version via `<program> --version`.
///
/// Returns the first stdout line, or `None` when the tool is missing
/// or unresponsive.
pub async fn probe_version(program: &str) -> Option<String> {
    let output = run_tool(program, &["--version"], None, 10).await.ok()?;
    output
        .stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_tool_captures_stdout() {
        let output = run_tool("echo", &["hello"], None, 10).await.expect("runs");
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_tool_nonzero_exit_is_not_an_error() {
        let output = run_tool("false", &[], None, 10).await.expect("runs");
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let err = run_tool("definitely-not-a-real-tool", &[], None, 10)
            .await
            .expect_err("missing binary");
        assert!(matches!(err, VigilError::Scanner { .. }));
    }

    #[tokio::test]
    async fn test_run_tool_timeout_kills_process() {
        let err = run_tool("sleep", &["30"], None, 1)
            .await
            .expect_err("times out");
        match err {
            VigilError::Timeout { operation, seconds } => {
                assert_eq!(operation, "sleep");
                assert_eq!(seconds, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_probe_version_missing_tool() {
        assert!(probe_version("definitely-not-a-real-tool").await.is_none());
    }
}
