// SPDX-License-Identifier: Apache-2.0

//! Configuration management for Vigil.
//!
//! Provides layered configuration from files and environment variables.
//! Uses XDG-compliant paths with environment variable support.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (prefix: `VIGIL_`)
//! 2. Config file: `~/.config/vigil/config.toml`
//! 3. Built-in defaults
//!
//! # Examples
//!
//! ```bash
//! # Override the cache TTL via environment variable
//! VIGIL_CACHE__TTL_SECONDS=7200 cargo run
//! ```

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::VigilError;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan result cache settings.
    pub cache: CacheConfig,
    /// Scan pipeline settings.
    pub scan: ScanConfig,
    /// Hosting-provider settings.
    pub providers: ProvidersConfig,
}

/// Scan result cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default time-to-live for cache entries, in seconds.
    pub ttl_seconds: u64,
    /// Maximum number of live cache entries before eviction.
    pub max_entries: usize,
    /// Interval between background expiry sweeps, in seconds.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            max_entries: 100,
            sweep_interval_seconds: 300,
        }
    }
}

/// Scan pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Wall-clock limit for a single scanner invocation, in seconds.
    pub scanner_timeout_seconds: u64,
    /// Wall-clock limit for a repository clone, in seconds.
    pub clone_timeout_seconds: u64,
    /// History depth for ephemeral clones (1 = shallow).
    pub clone_depth: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scanner_timeout_seconds: 300,
            clone_timeout_seconds: 300,
            clone_depth: 1,
        }
    }
}

/// Hosting-provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Platform API request timeout in seconds.
    pub api_timeout_seconds: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            api_timeout_seconds: 10,
        }
    }
}

/// Returns the Vigil configuration directory.
///
/// Respects the `XDG_CONFIG_HOME` environment variable if set,
/// otherwise defaults to `~/.config/vigil`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join("vigil");
    }
    dirs::home_dir()
        .expect("Could not determine home directory - is HOME set?")
        .join(".config")
        .join("vigil")
}

/// Returns the path to the Vigil config file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Loads the application configuration.
///
/// Layers `VIGIL_*` environment variables over the config file over
/// built-in defaults. A missing config file is not an error.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or
/// if an environment override has the wrong type.
pub fn load_config() -> Result<AppConfig, VigilError> {
    let builder = Config::builder()
        .add_source(File::from(config_file_path()).required(false))
        .add_source(Environment::with_prefix("VIGIL").separator("__"));

    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_seconds, 3600);
        assert_eq!(config.max_entries, 100);
        assert_eq!(config.sweep_interval_seconds, 300);
    }

    #[test]
    fn test_default_scan_config() {
        let config = ScanConfig::default();
        assert_eq!(config.scanner_timeout_seconds, 300);
        assert_eq!(config.clone_timeout_seconds, 300);
        assert_eq!(config.clone_depth, 1);
    }

    #[test]
    fn test_app_config_deserializes_partial_toml() {
        let toml = r"
            [cache]
            ttl_seconds = 60
        ";
        let config: AppConfig = toml::from_str(toml).expect("parse");
        assert_eq!(config.cache.ttl_seconds, 60);
        // Unspecified sections fall back to defaults
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.scan.scanner_timeout_seconds, 300);
    }

    #[test]
    fn test_config_dir_ends_with_vigil() {
        let dir = config_dir();
        assert!(dir.ends_with("vigil"));
    }
}
