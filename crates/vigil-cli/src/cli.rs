// SPDX-License-Identifier: Apache-2.0

//! Command-line interface definition for Vigil.
//!
//! Uses clap's derive API for declarative CLI parsing with hierarchical
//! noun-verb subcommands.

use std::io::IsTerminal;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for CLI results.
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with tables (default)
    #[default]
    Text,
    /// JSON output for programmatic consumption
    Json,
}

/// Global output configuration passed to commands.
#[derive(Clone, Copy)]
pub struct OutputContext {
    /// Output format (text, json)
    pub format: OutputFormat,
    /// Suppress non-essential output
    pub quiet: bool,
    /// Whether stdout is a terminal (TTY)
    pub is_tty: bool,
}

impl OutputContext {
    /// Creates an `OutputContext` from CLI arguments.
    #[must_use]
    pub fn from_cli(format: OutputFormat, quiet: bool) -> Self {
        Self {
            format,
            quiet,
            is_tty: std::io::stdout().is_terminal(),
        }
    }
}

/// Vigil - repository security scan orchestration.
///
/// Scans remote repositories for security issues by delegating to
/// hosting-platform APIs and external analysis tools, with repeat-scan
/// caching and change detection.
#[derive(Parser)]
#[command(name = "vigil")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Output format (text, json)
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug-level logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Scan a repository for security issues
    Scan {
        /// Repository URL (GitHub, GitLab, Bitbucket, Azure DevOps,
        /// Gitea/Forgejo/Codeberg, or any git remote)
        url: String,

        /// Bypass cache and change detection; always scan in full
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Show a repository's scan history
    History {
        /// Repository URL
        url: String,

        /// Maximum entries to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// List scan records for every tracked repository
    Records,

    /// Show aggregate scan statistics
    Stats,

    /// Cache operations
    #[command(subcommand)]
    Cache(CacheCommand),

    /// List registered providers and their health
    Providers {
        /// Probe provider endpoints for availability
        #[arg(long)]
        health: bool,
    },

    /// Show the lines around a finding location
    Context {
        /// Repository URL
        url: String,

        /// Repository-relative file path
        file: String,

        /// Line number (1-indexed)
        line: u64,

        /// Lines of context before and after
        #[arg(long, short = 'c', default_value_t = 3)]
        context: u64,
    },

    /// Shell completion scripts
    #[command(subcommand)]
    Completion(CompletionCommand),
}

/// Cache subcommands.
#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show cache statistics
    Stats,
    /// Remove every cache entry
    Clear,
    /// Remove every cache entry for one repository
    Invalidate {
        /// Repository URL
        url: String,
    },
}

/// Completion subcommands.
#[derive(Subcommand)]
pub enum CompletionCommand {
    /// Generate a completion script for a shell
    Generate {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_with_force_flag() {
        let cli = Cli::try_parse_from(["vigil", "scan", "https://github.com/a/b", "--force"])
            .expect("parses");
        match cli.command {
            Commands::Scan { url, force } => {
                assert_eq!(url, "https://github.com/a/b");
                assert!(force);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_context_defaults() {
        let cli = Cli::try_parse_from([
            "vigil",
            "context",
            "https://github.com/a/b",
            "src/lib.rs",
            "42",
        ])
        .expect("parses");
        match cli.command {
            Commands::Context { line, context, .. } => {
                assert_eq!(line, 42);
                assert_eq!(context, 3);
            }
            _ => panic!("wrong command"),
        }
    }
}
