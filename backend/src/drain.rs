//! Stderr drain. Keeps a session's error pipe from filling up.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Background task that reads a child's stderr line by line and
/// forwards each line to the log, tagged with the owning project.
///
/// Runs until EOF or an explicit [`stop`](StderrDrain::stop); read
/// errors simply end the drain. Never surfaces anything to callers.
pub(crate) struct StderrDrain {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl StderrDrain {
    pub fn spawn(project: &str, stderr: ChildStderr) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let project = project.to_string();
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            tracing::debug!(project = %project, "ghc-mod stderr: {line}");
                        }
                        Ok(None) | Err(_) => break,
                    },
                }
            }
        });
        Self { stop_tx, handle }
    }

    /// Signal the drain to stop and wait for the task to exit, so the
    /// stream can be closed safely afterwards.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.await;
    }
}
