//! Graceful child termination with SIGTERM → SIGKILL escalation.
//!
//! Cancelling a pull must not leave an orphaned download process running,
//! and the child must be reaped to avoid zombies. On unix the child first
//! gets a SIGTERM and a short grace period; on other platforms `kill()`
//! is the only option.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Grace period between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(2);

/// Terminate `child` and wait for it to be reaped.
pub async fn terminate_child(mut child: Child) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else {
            // Already reaped by an earlier wait.
            return child.wait().await;
        };

        #[allow(clippy::cast_possible_wrap)]
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {}
            // ESRCH: exited between id() and kill(); just reap it.
            Err(nix::errno::Errno::ESRCH) => return child.wait().await,
            Err(e) => return Err(io::Error::other(e)),
        }

        if let Ok(status) = tokio::time::timeout(TERM_GRACE, child.wait()).await {
            return status;
        }
        // Did not exit in time; escalate.
    }

    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    #[cfg(unix)]
    async fn terminates_a_long_running_child() {
        let child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let started = std::time::Instant::now();
        let status = terminate_child(child).await.expect("termination failed");
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn handles_already_exited_child() {
        let child = Command::new("echo")
            .arg("done")
            .spawn()
            .expect("failed to spawn echo");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(terminate_child(child).await.is_ok());
    }
}
