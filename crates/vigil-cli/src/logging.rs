// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the Vigil CLI.
//!
//! Uses `tracing` with `tracing-subscriber` for structured logging.
//! Log level can be controlled via the `RUST_LOG` environment variable.
//!
//! # Examples
//!
//! ```bash
//! # Default: warnings only
//! vigil scan https://github.com/owner/repo
//!
//! # Debug output for troubleshooting
//! RUST_LOG=vigil=debug vigil scan https://github.com/owner/repo
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the logging subsystem.
///
/// The `verbose` flag raises the default filter to debug; `RUST_LOG`
/// overrides everything. Logs go to stderr so structured stdout output
/// stays machine-parseable.
pub fn init_logging(verbose: bool) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let default_filter = if verbose {
        "vigil=debug,vigil_core=debug,octocrab=warn,reqwest=warn"
    } else {
        "vigil=warn,vigil_core=warn,octocrab=error,reqwest=error"
    };
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .expect("valid default filter directives");

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
