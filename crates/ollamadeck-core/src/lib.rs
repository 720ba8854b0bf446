//! Domain types, ports and settings for ollamadeck.
//!
//! This crate is the dependency-free center of the workspace: pure data
//! types for local and remote models, the async ports implemented by the
//! infrastructure crates (`ollamadeck-runner`, `ollamadeck-registry`), and
//! the application settings. No subprocess, network or filesystem code
//! lives here.

pub mod domain;
pub mod ports;
pub mod pull;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{InstalledModel, ModelTag, RemoteModel, RunningModel};
pub use ports::{CommandOutcome, ModelRunner, RegistryCatalog, RunnerError, RunnerResult};
pub use pull::{PullEvent, PullOutcome, PullStream};
pub use settings::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_PS_REFRESH_SECS, DEFAULT_REGISTRY_URL, DEFAULT_RUNNER_BINARY,
    Settings,
};
