//! Application settings.
//!
//! Pure domain types with no infrastructure dependencies. All fields are
//! optional so partial configuration files and defaults compose cleanly;
//! the `effective_*` accessors apply the fallbacks.

use serde::{Deserialize, Serialize};

/// Name of the external model-runner binary.
pub const DEFAULT_RUNNER_BINARY: &str = "ollama";

/// Base URL of the remote model registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://ollama.com";

/// Interval for the recurring running-models poll, in seconds.
pub const DEFAULT_PS_REFRESH_SECS: u64 = 5;

/// Validity window for cached registry data: 24 hours.
pub const DEFAULT_CACHE_TTL_SECS: i64 = 24 * 60 * 60;

/// Application settings structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Model-runner binary name or path.
    pub runner_binary: Option<String>,

    /// Registry base URL (index and tag pages live under it).
    pub registry_url: Option<String>,

    /// Seconds between automatic running-models refreshes.
    pub ps_refresh_secs: Option<u64>,

    /// Seconds a cached registry fetch stays valid.
    pub cache_ttl_secs: Option<i64>,

    /// Override for the cache directory (defaults to the platform cache
    /// root, resolved by the composition root).
    pub cache_dir: Option<String>,
}

impl Settings {
    /// Effective binary name (with default fallback).
    #[must_use]
    pub fn effective_runner_binary(&self) -> &str {
        self.runner_binary.as_deref().unwrap_or(DEFAULT_RUNNER_BINARY)
    }

    /// Effective registry base URL, without a trailing slash.
    #[must_use]
    pub fn effective_registry_url(&self) -> &str {
        self.registry_url
            .as_deref()
            .unwrap_or(DEFAULT_REGISTRY_URL)
            .trim_end_matches('/')
    }

    /// Effective poll interval.
    #[must_use]
    pub fn effective_ps_refresh_secs(&self) -> u64 {
        self.ps_refresh_secs.unwrap_or(DEFAULT_PS_REFRESH_SECS)
    }

    /// Effective cache TTL.
    #[must_use]
    pub fn effective_cache_ttl_secs(&self) -> i64 {
        self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS)
    }
}
