//! Ports implemented by the infrastructure crates.
//!
//! The orchestration layer depends only on these traits; concrete
//! implementations (`OllamaCli`, `RegistryClient`) are injected at the
//! composition root. Failure policy at the ports follows the boundary
//! rule: process and network faults become values (booleans, empty lists,
//! tagged outcomes) — nothing escapes as an unhandled fault.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{InstalledModel, ModelTag, RemoteModel, RunningModel};
use crate::pull::PullStream;

/// Result type alias for model-runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors from invoking the external model-runner binary.
///
/// Note that a missing binary is NOT an error for `check_available` (it is
/// the `false` answer), and parse failures of individual output lines never
/// surface here — they are logged and skipped inside the parser.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The binary could not be launched at all.
    #[error("failed to launch '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while reading captured output.
    #[error("i/o error while reading command output: {0}")]
    Io(#[from] std::io::Error),
}

/// Success flag plus trimmed display message for one-shot commands
/// (`rm`, `stop`): stdout on success, stderr on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

/// Port over the external model-runner CLI.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    /// Whether the binary is present and answers `--version`.
    async fn check_available(&self) -> bool;

    /// Installed models from the tabular `list` output.
    async fn list_installed(&self) -> RunnerResult<Vec<InstalledModel>>;

    /// Loaded models from the tabular `ps` output.
    async fn list_running(&self) -> RunnerResult<Vec<RunningModel>>;

    /// Remove an installed model.
    async fn delete(&self, name: &str) -> RunnerResult<CommandOutcome>;

    /// Unload a running model.
    async fn stop(&self, name: &str) -> RunnerResult<CommandOutcome>;

    /// Free-text details blob for display. Failures come back as an
    /// error-prefixed string, never as an `Err` — the caller shows
    /// whatever it gets.
    async fn show_details(&self, name: &str) -> String;

    /// Start a streaming download of `tag`, yielding progress events.
    async fn pull(&self, tag: &str) -> RunnerResult<PullStream>;
}

/// Port over the remote registry (index + per-family tag pages).
///
/// Both fetches are fail-soft: any network, timeout or layout problem
/// yields an empty list plus a logged error. Callers must treat "empty"
/// as "try again later", not as a confirmed absence.
#[async_trait]
pub trait RegistryCatalog: Send + Sync {
    /// Model families from the registry index page (time-boxed cache).
    async fn search_models(&self) -> Vec<RemoteModel>;

    /// Tags for one family from its detail page (cached per family).
    async fn fetch_tags(&self, family: &str) -> Vec<ModelTag>;

    /// Drop all cached registry data unconditionally.
    fn flush_cache(&self);
}
