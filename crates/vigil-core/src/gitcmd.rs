// SPDX-License-Identifier: Apache-2.0

//! Bounded-lifetime git subprocess invocation.
//!
//! Every git operation runs as a child process with a hard wall-clock
//! deadline, forced termination on expiry, and buffered stdout/stderr
//! capture. This module is the single place the `git` binary is spawned
//! from; provider adapters build on it for their clone and inspection
//! fallbacks.
//!
//! Authenticated URLs may carry embedded credentials; callers must pass
//! a `display_url` without credentials for use in errors and logs.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::debug;

use crate::error::VigilError;
use crate::provider::types::{CloneOptions, CommitInfo};

/// Maximum characters of a README line carried into a metadata description.
const README_DESCRIPTION_LIMIT: usize = 200;

/// Runs `git` with the given arguments and returns trimmed stdout.
///
/// The child is spawned with `kill_on_drop` and explicitly killed when
/// the deadline expires, so a hung remote never leaves an orphaned
/// subprocess behind.
///
/// # Errors
///
/// Returns [`VigilError::Timeout`] when the deadline expires,
/// [`VigilError::Git`] when git exits unsuccessfully, and
/// [`VigilError::Io`] when the binary cannot be spawned.
pub async fn run_git(
    args: &[&str],
    cwd: Option<&Path>,
    timeout_seconds: u64,
) -> Result<String, VigilError> {
    let operation = args.first().copied().unwrap_or("git").to_string();
    debug!(operation = %operation, timeout_seconds, "Running git subprocess");

    let mut command = Command::new("git");
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let child = command.spawn()?;

    let deadline = Duration::from_secs(timeout_seconds);
    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            // wait_with_output consumed the child; kill_on_drop already
            // delivered SIGKILL when the future was dropped.
            return Err(VigilError::Timeout {
                operation: format!("git {operation}"),
                seconds: timeout_seconds,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(VigilError::Git {
            operation,
            message: if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resolves the commit hash of a remote's HEAD via `git ls-remote`.
///
/// Returns `None` for an empty repository (ls-remote succeeds with no
/// HEAD line); callers map that to the `"unknown"` sentinel.
///
/// # Errors
///
/// Propagates subprocess failures from [`run_git`].
pub async fn ls_remote_head(
    url: &str,
    timeout_seconds: u64,
) -> Result<Option<String>, VigilError> {
    let stdout = run_git(&["ls-remote", url, "HEAD"], None, timeout_seconds).await?;
    Ok(stdout
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .map(ToString::to_string))
}

/// Clones `url` into `dest` with the given options.
///
/// `url` may carry embedded credentials; `display_url` is the
/// credential-free form used in error messages.
///
/// # Errors
///
/// Returns [`VigilError::Clone`] wrapping any subprocess failure, with
/// the timeout preserved as [`VigilError::Timeout`].
pub async fn clone_repository(
    url: &str,
    display_url: &str,
    dest: &Path,
    options: &CloneOptions,
) -> Result<(), VigilError> {
    let depth = options.depth.to_string();
    let dest_str = dest.to_string_lossy().to_string();
    let mut args = vec!["clone", "--depth", depth.as_str(), "--single-branch"];
    if let Some(branch) = options.branch.as_deref() {
        args.push("--branch");
        args.push(branch);
    }
    args.push(url);
    args.push(dest_str.as_str());

    match run_git(&args, None, options.timeout_seconds).await {
        Ok(_) => Ok(()),
        Err(timeout @ VigilError::Timeout { .. }) => Err(timeout),
        Err(err) => Err(VigilError::Clone {
            url: display_url.to_string(),
            message: err.to_string(),
        }),
    }
}

/// Reads the HEAD commit of a local clone.
///
/// # Errors
///
/// Propagates subprocess failures from [`run_git`].
pub async fn local_head_commit(
    workdir: &Path,
    timeout_seconds: u64,
) -> Result<CommitInfo, VigilError> {
    // Unit separator keeps the fields unambiguous in one log line.
    let stdout = run_git(
        &["log", "-1", "--format=%H%x1f%cI%x1f%s%x1f%an"],
        Some(workdir),
        timeout_seconds,
    )
    .await?;

    let mut fields = stdout.split('\u{1f}');
    let hash = fields.next().unwrap_or_default().to_string();
    let timestamp = fields
        .next()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map_or_else(Utc::now, |parsed| parsed.with_timezone(&Utc));
    let message = fields.next().filter(|s| !s.is_empty()).map(ToString::to_string);
    let author = fields.next().filter(|s| !s.is_empty()).map(ToString::to_string);

    if hash.is_empty() {
        return Err(VigilError::Git {
            operation: "log".to_string(),
            message: "no commits in repository".to_string(),
        });
    }

    Ok(CommitInfo {
        hash,
        timestamp,
        message,
        author,
    })
}

/// Reads the checked-out branch name of a local clone.
///
/// # Errors
///
/// Propagates subprocess failures from [`run_git`].
pub async fn local_branch(workdir: &Path, timeout_seconds: u64) -> Result<String, VigilError> {
    let branch = run_git(
        &["rev-parse", "--abbrev-ref", "HEAD"],
        Some(workdir),
        timeout_seconds,
    )
    .await?;
    Ok(if branch.is_empty() {
        "main".to_string()
    } else {
        branch
    })
}

/// Derives a one-line description from a README in the clone root.
///
/// Returns the first non-trivial line (not a heading marker, badge, or
/// blank), truncated to 200 characters. `None` when no README exists or
/// nothing qualifies.
#[must_use]
pub fn readme_description(workdir: &Path) -> Option<String> {
    const CANDIDATES: [&str; 4] = ["README.md", "README.rst", "README.txt", "README"];

    let content = CANDIDATES
        .iter()
        .find_map(|name| std::fs::read_to_string(workdir.join(name)).ok())?;

    content
        .lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.starts_with('#')
                && !line.starts_with("![")
                && !line.starts_with("[!")
                && !line.starts_with("===")
                && !line.starts_with("---")
        })
        .map(|line| {
            if line.chars().count() > README_DESCRIPTION_LIMIT {
                let truncated: String = line.chars().take(README_DESCRIPTION_LIMIT).collect();
                truncated
            } else {
                line.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readme_description_skips_headings_and_badges() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("README.md"),
            "# Project\n\n![badge](https://img.example/b.svg)\n\nA scanner orchestrator.\n",
        )
        .expect("write");

        let description = readme_description(dir.path());
        assert_eq!(description.as_deref(), Some("A scanner orchestrator."));
    }

    #[test]
    fn test_readme_description_truncates_to_200_chars() {
        let dir = tempfile::tempdir().expect("tempdir");
        let long_line = "x".repeat(500);
        std::fs::write(dir.path().join("README"), &long_line).expect("write");

        let description = readme_description(dir.path()).expect("description");
        assert_eq!(description.chars().count(), 200);
    }

    #[test]
    fn test_readme_description_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(readme_description(dir.path()).is_none());
    }

    #[tokio::test]
    async fn test_run_git_reports_failure_with_stderr() {
        let err = run_git(&["rev-parse", "HEAD"], Some(Path::new("/")), 30)
            .await
            .expect_err("should fail outside a repository");
        match err {
            VigilError::Git { operation, .. } => assert_eq!(operation, "rev-parse"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_local_git_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path();
        run_git(&["init", "-q", "-b", "main"], Some(path), 30)
            .await
            .expect("init");
        run_git(&["config", "user.email", "test@example.com"], Some(path), 30)
            .await
            .expect("config email");
        run_git(&["config", "user.name", "Test"], Some(path), 30)
            .await
            .expect("config name");
        std::fs::write(path.join("file.txt"), "contents").expect("write");
        run_git(&["add", "."], Some(path), 30).await.expect("add");
        run_git(&["commit", "-q", "-m", "initial commit"], Some(path), 30)
            .await
            .expect("commit");

        let commit = local_head_commit(path, 30).await.expect("head commit");
        assert_eq!(commit.hash.len(), 40);
        assert_eq!(commit.message.as_deref(), Some("initial commit"));
        assert_eq!(commit.author.as_deref(), Some("Test"));

        let branch = local_branch(path, 30).await.expect("branch");
        assert_eq!(branch, "main");
    }
}
