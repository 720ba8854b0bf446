//! Pull progress stream types.
//!
//! A pull is the only long-running, user-cancellable operation in the
//! system. The runner exposes it as a pull-based lazy sequence of events
//! rather than a callback: the consumer awaits [`PullStream::next_event`]
//! and may stop at any time via [`PullStream::cancel`], which terminates
//! the underlying subprocess and suppresses any further delivery.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One event from an in-flight pull.
#[derive(Debug, Clone, PartialEq)]
pub enum PullEvent {
    /// A progress line was emitted by the subprocess (ANSI-stripped,
    /// trimmed, non-empty). `percent` is extracted from the line when it
    /// carries one; lines without a parseable percent leave the consumer's
    /// previous value unchanged.
    Progress {
        line: String,
        percent: Option<f32>,
    },
    /// The subprocess exited cleanly and no line reported an error.
    Completed,
    /// Terminal failure: either a line containing "error" (case-insensitive)
    /// or a non-zero exit status. The message is the offending line.
    Failed { message: String },
}

/// How a pull session ended, as reported to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Completed,
    Failed { message: String },
    Cancelled,
}

/// Cancellable, finite sequence of [`PullEvent`]s.
///
/// The stream ends after a terminal event (`Completed`/`Failed`), or
/// silently once cancelled. Dropping the stream has the same effect as
/// cancelling it: the producer notices the closed channel and terminates
/// the subprocess rather than letting the download run on in the
/// background.
pub struct PullStream {
    events: mpsc::Receiver<PullEvent>,
    cancel: CancellationToken,
}

impl PullStream {
    #[must_use]
    pub fn new(events: mpsc::Receiver<PullEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next event, or `None` once the stream is exhausted or cancelled.
    ///
    /// After [`cancel`](Self::cancel) this returns `None` immediately,
    /// including for events that were already buffered when cancellation
    /// was requested — delivery is suppressed, not just production.
    pub async fn next_event(&mut self) -> Option<PullEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the producing task; shared with the session
    /// bookkeeping in the orchestration layer.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for PullStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
