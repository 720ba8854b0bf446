//! Exclusive task slots.
//!
//! Each refreshable resource has one slot. Starting a task hands out a
//! fresh [`CancellationToken`] and cancels whatever token previously held
//! the slot, so at most one task per key can still deliver a result. The
//! slot map is its own small type because both manual refreshes and the
//! background poller go through it and must contend for the same keys.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identity of an exclusive background task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskKey {
    /// Installed-models refresh.
    List,
    /// Running-models refresh (manual or poller).
    Ps,
    /// Remote catalog refresh.
    Search,
    /// Tag fetch for one model family.
    Tags(String),
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Ps => write!(f, "ps"),
            Self::Search => write!(f, "search"),
            Self::Tags(family) => write!(f, "tags:{family}"),
        }
    }
}

/// Per-key cancellation slots enforcing at-most-one in-flight task.
#[derive(Debug, Default)]
pub struct Exclusive {
    slots: Mutex<HashMap<TaskKey, CancellationToken>>,
}

impl Exclusive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `key`, cancelling any in-flight predecessor.
    ///
    /// The returned token belongs to the new task; it observes it both to
    /// abandon work early and to suppress delivery of an already-computed
    /// result.
    pub fn begin(&self, key: TaskKey) -> CancellationToken {
        let token = CancellationToken::new();
        let mut slots = self.slots.lock().unwrap();
        if let Some(previous) = slots.insert(key.clone(), token.clone()) {
            if !previous.is_cancelled() {
                debug!(key = %key, "superseding in-flight task");
                previous.cancel();
            }
        }
        token
    }
}
