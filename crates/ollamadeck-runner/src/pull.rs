//! Cancellable streaming `pull`.
//!
//! The subcommand streams carriage-return progress lines on both stdout
//! and stderr. Each pipe gets its own reader task feeding a shared line
//! channel through a [`LineDemuxer`]; a driver task turns lines into
//! [`PullEvent`]s and owns the child so it can terminate it on
//! cancellation, on a dropped consumer, or after an error line.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ollamadeck_core::{PullEvent, PullStream, RunnerError, RunnerResult};

use crate::demux::LineDemuxer;
use crate::shutdown::terminate_child;

/// Read size matching the interactive cadence of progress output.
const READ_CHUNK: usize = 256;

pub(crate) fn spawn_pull(binary: &str, tag: &str) -> RunnerResult<PullStream> {
    let mut child = Command::new(binary)
        .arg("pull")
        .arg(tag)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    let (event_tx, event_rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let stream = PullStream::new(event_rx, cancel.clone());

    let (line_tx, line_rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(read_lines(stdout, line_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(read_lines(stderr, line_tx.clone()));
    }
    drop(line_tx);

    tokio::spawn(drive_pull(child, binary.to_string(), line_rx, event_tx, cancel));
    Ok(stream)
}

/// Demux one pipe into trimmed, ANSI-free lines.
async fn read_lines(mut pipe: impl AsyncRead + Unpin + Send + 'static, tx: mpsc::Sender<String>) {
    let mut demuxer = LineDemuxer::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in demuxer.feed(&buf[..n]) {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "pull output reader exiting on read error");
                break;
            }
        }
    }
    if let Some(line) = demuxer.finish() {
        let _ = tx.send(line).await;
    }
}

async fn drive_pull(
    child: Child,
    binary: String,
    mut lines: mpsc::Receiver<String>,
    events: mpsc::Sender<PullEvent>,
    cancel: CancellationToken,
) {
    let failure: Option<String> = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("pull cancelled, terminating subprocess");
                if let Err(e) = terminate_child(child).await {
                    warn!(error = %e, "failed to terminate cancelled pull");
                }
                return;
            }
            line = lines.recv() => match line {
                Some(line) => {
                    // An error line is terminal even if the process later
                    // exits with status zero.
                    if line.to_lowercase().contains("error") {
                        break Some(line);
                    }
                    let percent = extract_percent(&line);
                    if events.send(PullEvent::Progress { line, percent }).await.is_err() {
                        // Consumer dropped the stream: treat as cancellation.
                        let _ = terminate_child(child).await;
                        return;
                    }
                }
                None => break None,
            }
        }
    };

    let event = if let Some(message) = failure {
        let _ = terminate_child(child).await;
        PullEvent::Failed { message }
    } else {
        match reap(child).await {
            Ok(status) if status.success() => PullEvent::Completed,
            Ok(status) => PullEvent::Failed {
                message: format!("{binary} pull exited with {status}"),
            },
            Err(e) => PullEvent::Failed {
                message: format!("failed to wait for {binary} pull: {e}"),
            },
        }
    };

    if !cancel.is_cancelled() {
        let _ = events.send(event).await;
    }
}

async fn reap(mut child: Child) -> std::io::Result<std::process::ExitStatus> {
    child.wait().await
}

/// Extract the percent value from a progress line: the last
/// whitespace-delimited run of digits/decimal point before the first `%`.
/// Lines without a parseable percent return `None`.
#[must_use]
pub fn extract_percent(line: &str) -> Option<f32> {
    let (before, _) = line.split_once('%')?;
    before.split_whitespace().rev().find_map(|token| {
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == '.') {
            token.parse::<f32>().ok()
        } else {
            None
        }
    })
}
