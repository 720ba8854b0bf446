//! Command-line adapter for ollamadeck.
//!
//! `bootstrap` is the composition root: the only place where concrete
//! infrastructure (the ollama CLI wrapper, the registry client, the cache
//! directory) is wired into the application service. Command handlers
//! receive the composed context and drive everything through it.

pub mod bootstrap;
pub mod commands;
mod parser;

pub use commands::Commands;
pub use parser::Cli;
