//! Interactive session client: one ghc-mod subprocess per project.
//!
//! The tool multiplexes two logical channels onto stdout using a
//! fixed-width line prefix (`O: ` for output, `X: ` for errors); the
//! only reply terminator is `OK` on the output channel. A session
//! guarantees single-flight access: the internal lock is held from
//! writing a command through reading its complete reply, so replies
//! from concurrent callers never interleave.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use crate::drain::StderrDrain;
use crate::launch::{LaunchError, Launcher};

/// Prefix of normal-channel reply lines.
pub(crate) const OUTPUT_MARKER: &str = "O: ";
/// Prefix of error-channel reply lines.
pub(crate) const ERROR_MARKER: &str = "X: ";
/// Prefix of a tool-signaled command failure.
const FAILURE_MARKER: &str = "NG ";

/// ASCII EOT line terminating a `map-file` content upload.
const CONTENT_TERMINATOR: &[u8] = b"\n\x04\n";

/// Grace period for the subprocess to exit after the blank terminator
/// line before it is killed.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// The two ordered line sequences produced by one command's reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReply {
    out: Vec<String>,
    err: Vec<String>,
}

impl RawReply {
    /// Normal-channel lines, prefixes stripped, terminator excluded.
    #[must_use]
    pub fn out(&self) -> &[String] {
        &self.out
    }

    /// Error-channel lines, prefixes stripped.
    #[must_use]
    pub fn err(&self) -> &[String] {
        &self.err
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty() && self.err.is_empty()
    }

    #[must_use]
    pub fn into_out(self) -> Vec<String> {
        self.out
    }
}

/// How a read-reply loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyStatus {
    /// `O: OK` terminator seen; the reply is complete.
    Complete,
    /// `NG` line seen: the tool rejected the command. The session
    /// stays alive; the tool remains in its command loop.
    ToolFailure,
    /// A line with an unknown prefix arrived. The stream is treated as
    /// poisoned and the session is shut down rather than attempting to
    /// resynchronize on a later `OK`.
    ProtocolViolation,
    /// End of stream or read error; the process is gone.
    Disconnected,
}

/// Read one command's reply from the output stream.
///
/// Accumulates `O: `/`X: ` lines in order until a terminating
/// condition; see [`ReplyStatus`] for the outcomes.
pub(crate) async fn read_reply<R>(reader: &mut R) -> (ReplyStatus, RawReply)
where
    R: AsyncBufRead + Unpin,
{
    let mut reply = RawReply::default();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => return (ReplyStatus::Disconnected, reply),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("read error on ghc-mod output stream: {e}");
                return (ReplyStatus::Disconnected, reply);
            }
        }

        let text = line.trim_end();
        if let Some(rest) = text.strip_prefix(OUTPUT_MARKER) {
            if rest == "OK" {
                return (ReplyStatus::Complete, reply);
            }
            reply.out.push(rest.to_string());
        } else if let Some(rest) = text.strip_prefix(ERROR_MARKER) {
            reply.err.push(rest.to_string());
        } else if let Some(rest) = text.strip_prefix(FAILURE_MARKER) {
            tracing::warn!("ghc-mod rejected command: {rest}");
            return (ReplyStatus::ToolFailure, reply);
        } else {
            tracing::warn!("unexpected reply line from ghc-mod: {text:?}");
            return (ReplyStatus::ProtocolViolation, reply);
        }
    }
}

struct SessionInner {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    drain: StderrDrain,
}

enum Outcome {
    Reply(RawReply),
    Poisoned,
}

/// One persistent `ghc-mod legacy-interactive` subprocess.
///
/// The inner state is an `Option` behind the single-flight lock:
/// `Some` is alive, `None` is dead. Death is a one-way transition
/// taken exactly once; every operation on a dead session returns an
/// empty reply rather than raising.
pub struct Session {
    project: String,
    inner: Mutex<Option<SessionInner>>,
}

impl Session {
    /// Spawn the tool in `project_dir` and enter interactive mode.
    ///
    /// `opt_args` carry per-project options (`-g` pairs built from GHC
    /// options, package databases and include paths).
    pub fn start(
        launcher: &Launcher,
        project: &str,
        project_dir: &Path,
        opt_args: &[String],
    ) -> Result<Self, LaunchError> {
        tracing::info!(project = %project, "starting ghc-mod session");

        let mut args = vec![
            "-b".to_string(),
            "\\n".to_string(),
            "--line-prefix".to_string(),
            format!("{OUTPUT_MARKER},{ERROR_MARKER}"),
        ];
        args.extend(opt_args.iter().cloned());
        args.push("legacy-interactive".to_string());

        let mut child = launcher.spawn("ghc-mod", &args, project_dir)?;
        let pipe_error = |what: &str| LaunchError::Spawn {
            command: "ghc-mod".to_string(),
            source: std::io::Error::other(format!("no {what} pipe on child")),
        };
        let stdin = child.stdin.take().ok_or_else(|| pipe_error("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| pipe_error("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| pipe_error("stderr"))?;

        Ok(Self {
            project: project.to_string(),
            inner: Mutex::new(Some(SessionInner {
                child,
                stdin,
                stdout: BufReader::new(stdout),
                drain: StderrDrain::spawn(project, stderr),
            })),
        })
    }

    /// A session that is already dead, for exercising the degraded path.
    #[cfg(test)]
    pub(crate) fn dead(project: &str) -> Self {
        Self {
            project: project.to_string(),
            inner: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    pub async fn is_alive(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Issue a command and await its complete reply.
    ///
    /// Transport failures and protocol violations shut the session
    /// down and yield an empty reply; callers treat an empty reply as
    /// "no information available", not as a hard error.
    pub async fn command(&self, command: &str) -> RawReply {
        let mut slot = self.inner.lock().await;
        self.roundtrip(&mut slot, command, None).await
    }

    /// Upload buffer contents under a logical name so the tool
    /// analyzes the unsaved buffer instead of the on-disk file.
    pub async fn map_file(&self, name: &str, contents: &str) -> RawReply {
        let mut slot = self.inner.lock().await;
        self.roundtrip(&mut slot, &format!("map-file {name}"), Some(contents))
            .await
    }

    /// Discard a previously uploaded buffer.
    pub async fn unmap_file(&self, name: &str) -> RawReply {
        let mut slot = self.inner.lock().await;
        self.roundtrip(&mut slot, &format!("unmap-file {name}"), None)
            .await
    }

    /// Terminate the session. Idempotent: shutting down a dead
    /// session is a no-op.
    pub async fn shutdown(&self) {
        let mut slot = self.inner.lock().await;
        Self::teardown(&mut slot, &self.project).await;
    }

    /// One single-flight command/reply cycle, executed while the
    /// caller holds the session lock.
    async fn roundtrip(
        &self,
        slot: &mut Option<SessionInner>,
        command: &str,
        payload: Option<&str>,
    ) -> RawReply {
        let outcome = match slot.as_mut() {
            None => return RawReply::default(),
            Some(inner) => match send_command(inner, command, payload).await {
                Err(e) => {
                    tracing::warn!(project = %self.project, "write to ghc-mod failed: {e}");
                    Outcome::Poisoned
                }
                Ok(()) => {
                    let (status, reply) = read_reply(&mut inner.stdout).await;
                    match status {
                        ReplyStatus::Complete | ReplyStatus::ToolFailure => Outcome::Reply(reply),
                        ReplyStatus::ProtocolViolation | ReplyStatus::Disconnected => {
                            Outcome::Poisoned
                        }
                    }
                }
            },
        };

        match outcome {
            Outcome::Reply(reply) => reply,
            Outcome::Poisoned => {
                Self::teardown(slot, &self.project).await;
                RawReply::default()
            }
        }
    }

    async fn teardown(slot: &mut Option<SessionInner>, project: &str) {
        let Some(mut inner) = slot.take() else {
            return;
        };
        tracing::info!(project = %project, "shutting down ghc-mod session");

        // A single blank line terminates legacy-interactive.
        let _ = inner.stdin.write_all(b"\n").await;
        let _ = inner.stdin.flush().await;

        inner.drain.stop().await;

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, inner.child.wait())
            .await
            .is_err()
        {
            tracing::debug!(project = %project, "ghc-mod did not exit in time, killing");
            let _ = inner.child.kill().await;
        }
    }
}

async fn send_command(
    inner: &mut SessionInner,
    command: &str,
    payload: Option<&str>,
) -> std::io::Result<()> {
    inner.stdin.write_all(command.as_bytes()).await?;
    inner.stdin.write_all(b"\n").await?;
    if let Some(contents) = payload {
        inner.stdin.write_all(contents.as_bytes()).await?;
        inner.stdin.write_all(CONTENT_TERMINATOR).await?;
    }
    inner.stdin.flush().await
}
