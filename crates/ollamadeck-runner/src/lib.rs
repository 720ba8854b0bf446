//! Subprocess command runner for the external model-runner CLI.
//!
//! Three layers, bottom up:
//!
//! - [`demux`] — incremental byte-stream to logical-line decoding. The
//!   pull subcommand emits carriage-return-driven progress overwrites and
//!   ANSI color codes; the demuxer turns that into clean text lines
//!   without ever corrupting a multi-byte character split across read
//!   chunks.
//! - [`parse`] — columnar table parsing for the `list` and `ps` output
//!   shapes. Malformed lines are logged and skipped, never fatal.
//! - [`runner`] — [`OllamaCli`], the [`ModelRunner`] port implementation:
//!   one-shot commands captured via `Output`, plus the cancellable
//!   streaming `pull`.
//!
//! [`ModelRunner`]: ollamadeck_core::ModelRunner

pub mod demux;
pub mod parse;
mod pull;
mod runner;
mod shutdown;

pub use demux::LineDemuxer;
pub use parse::{parse_list_output, parse_ps_output};
pub use pull::extract_percent;
pub use runner::OllamaCli;
pub use shutdown::terminate_child;
