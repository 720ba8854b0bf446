//! Orchestration layer for ollamadeck.
//!
//! [`AppService`] sits between the presentation layer and the ports in
//! `ollamadeck-core`: every slow operation runs as a spawned task and its
//! result comes back as an [`AppEvent`] on a channel, so the caller never
//! blocks. Refreshes are exclusive per resource (a newer request silently
//! supersedes an in-flight one), and at most one pull runs at a time.

mod events;
mod orchestrator;
mod service;

pub use events::AppEvent;
pub use orchestrator::{Exclusive, TaskKey};
pub use service::{AppService, PullError};
