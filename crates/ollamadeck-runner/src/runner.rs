//! [`ModelRunner`] implementation over the ollama CLI.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use ollamadeck_core::{
    CommandOutcome, InstalledModel, ModelRunner, PullStream, RunnerError, RunnerResult,
    RunningModel, Settings,
};

use crate::parse::{parse_list_output, parse_ps_output};
use crate::pull::spawn_pull;

/// Command runner for a locally installed `ollama` binary.
///
/// Every invocation spawns a fresh subprocess; nothing blocks the caller's
/// task beyond awaiting the captured output. One-shot subcommands map exit
/// status to plain values at this boundary — callers never see a raw
/// process fault.
pub struct OllamaCli {
    binary: String,
}

impl OllamaCli {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.effective_runner_binary())
    }

    async fn output(&self, args: &[&str]) -> RunnerResult<std::process::Output> {
        debug!(binary = %self.binary, ?args, "running subcommand");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;
        Ok(output)
    }

    /// `(success, message)` mapping shared by `rm` and `stop`: stdout on
    /// success, stderr on failure, always trimmed.
    async fn run_to_outcome(&self, args: &[&str]) -> RunnerResult<CommandOutcome> {
        let output = self.output(args).await?;
        let success = output.status.success();
        let raw = if success {
            output.stdout
        } else {
            output.stderr
        };
        Ok(CommandOutcome {
            success,
            message: String::from_utf8_lossy(&raw).trim().to_string(),
        })
    }
}

#[async_trait]
impl ModelRunner for OllamaCli {
    async fn check_available(&self) -> bool {
        // A missing binary is the `false` answer, not an error.
        match self.output(&["--version"]).await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    async fn list_installed(&self) -> RunnerResult<Vec<InstalledModel>> {
        let output = self.output(&["list"]).await?;
        Ok(parse_list_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn list_running(&self) -> RunnerResult<Vec<RunningModel>> {
        let output = self.output(&["ps"]).await?;
        Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn delete(&self, name: &str) -> RunnerResult<CommandOutcome> {
        self.run_to_outcome(&["rm", name]).await
    }

    async fn stop(&self, name: &str) -> RunnerResult<CommandOutcome> {
        self.run_to_outcome(&["stop", name]).await
    }

    async fn show_details(&self, name: &str) -> String {
        // Intentionally display text, not structured data.
        match self.output(&["show", name]).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(output) => format!("Error: {}", String::from_utf8_lossy(&output.stderr)),
            Err(e) => format!("Error: {e}"),
        }
    }

    async fn pull(&self, tag: &str) -> RunnerResult<PullStream> {
        spawn_pull(&self.binary, tag)
    }
}
