//! CLI bootstrap, the composition root.
//!
//! The only place where concrete infrastructure is instantiated: the
//! ollama CLI wrapper, the registry client with its on-disk cache, and
//! the application service wiring them together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use ollamadeck_app::{AppEvent, AppService};
use ollamadeck_core::Settings;
use ollamadeck_registry::{FetchCache, RegistryClient, RegistryConfig};
use ollamadeck_runner::OllamaCli;

/// Fully composed context for command handlers.
pub struct AppContext {
    pub service: AppService,
    pub events: mpsc::UnboundedReceiver<AppEvent>,
    /// Probed once at startup; handlers warn when the runner is missing.
    pub runner_available: bool,
}

/// Load settings from an explicit path, the platform config dir, or
/// defaults, in that order. A missing default file is fine; an explicit
/// `--config` that cannot be read is an error.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        return serde_json::from_str(&raw)
            .with_context(|| format!("invalid settings file {}", path.display()));
    }

    let Some(path) = default_settings_path() else {
        return Ok(Settings::default());
    };
    match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("invalid settings file {}", path.display())),
        Err(_) => Ok(Settings::default()),
    }
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ollamadeck").join("config.json"))
}

/// Cache directory: settings override, else the platform cache root.
fn cache_dir(settings: &Settings) -> PathBuf {
    settings.cache_dir.as_ref().map_or_else(
        || {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ollamadeck")
        },
        PathBuf::from,
    )
}

/// Wire everything together and probe the runner once.
pub async fn bootstrap(settings: Settings) -> AppContext {
    let runner = Arc::new(OllamaCli::from_settings(&settings));

    let cache = FetchCache::new(
        cache_dir(&settings).join("registry"),
        settings.effective_cache_ttl_secs(),
    );
    let registry = Arc::new(RegistryClient::new(
        RegistryConfig::from_settings(&settings),
        cache,
    ));

    let (service, events) = AppService::new(runner, registry, &settings);
    let runner_available = service.check_runner().await;
    tracing::debug!(
        runner = settings.effective_runner_binary(),
        available = runner_available,
        "composition complete"
    );

    AppContext {
        service,
        events,
        runner_available,
    }
}
