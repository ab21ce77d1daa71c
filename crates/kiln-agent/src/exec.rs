//! Bounded-lifetime shell command execution with live output streaming.
//!
//! A command runs as `sh -c <command>` in the caller's foreground process
//! group, so it can still prompt on the inherited terminal. Output is
//! forwarded chunk by chunk to the [`EventEmitter`] while it is also
//! buffered for the final [`ToolResult`]. When the timeout elapses the shell
//! receives SIGTERM, and SIGKILL once the kill grace period has passed.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{Sleep, sleep};
use tracing::{debug, warn};

use crate::config::DEFAULT_KILL_GRACE_MS;
use crate::context::{ContextInvalidator, NoopContextInvalidator};
use crate::events::{EventEmitter, NoopEventEmitter, OutputStream, SessionEvent};
use crate::tools::{RUN_COMMAND_TOOL, ToolResult};

const READ_CHUNK_SIZE: usize = 8192;
/// How long to keep collecting output after the child exits. Pipes stay open
/// while a backgrounded or orphaned grandchild still holds them.
const IO_DRAIN_TIMEOUT_MS: u64 = 2_000;

/// The capability tools use to run commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, cwd: &Path, timeout_ms: u64) -> ToolResult;
}

/// How a supervised command ended, before its output is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecOutcome {
    SpawnFailed(String),
    Exited(i32),
    Signaled(i32),
    TimedOut { timeout_ms: u64 },
}

impl ExecOutcome {
    fn from_status(status: ExitStatus, timed_out: bool, timeout_ms: u64) -> Self {
        if timed_out {
            return Self::TimedOut { timeout_ms };
        }
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }
        Self::Exited(-1)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Builds the tool result for this outcome from the captured output.
    pub fn into_result(self, stdout: &str, stderr: &str) -> ToolResult {
        match self {
            Self::Exited(0) => {
                let result = if stdout.is_empty() {
                    "Command executed successfully".to_string()
                } else {
                    stdout.to_string()
                };
                ToolResult::success(RUN_COMMAND_TOOL, result)
            }
            Self::Exited(code) => {
                let stderr = stderr.trim();
                let error = if stderr.is_empty() {
                    format!("Command failed with exit code {code}")
                } else {
                    stderr.to_string()
                };
                ToolResult::failure(RUN_COMMAND_TOOL, error).with_result(stdout)
            }
            Self::Signaled(signal) => ToolResult::failure(
                RUN_COMMAND_TOOL,
                format!("Command terminated by signal {}", signal_name(signal)),
            )
            .with_result(stdout),
            Self::TimedOut { timeout_ms } => ToolResult::failure(
                RUN_COMMAND_TOOL,
                format!(
                    "Command timed out after {timeout_ms} ms and was terminated. \
                     If it needs more time, increase timeout_ms."
                ),
            )
            .with_result(stdout),
            Self::SpawnFailed(reason) => ToolResult::failure(
                RUN_COMMAND_TOOL,
                format!("Failed to spawn command: {reason}"),
            ),
        }
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    nix::sys::signal::Signal::try_from(signal)
        .map(|signal| signal.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{signal}"))
}

#[cfg(not(unix))]
fn signal_name(signal: i32) -> String {
    format!("SIG{signal}")
}

/// Per-call state. Dropped when [`ProcessSupervisor::run`] resolves.
#[derive(Debug)]
struct ProcessExecution {
    command: String,
    cwd: PathBuf,
    timeout_ms: u64,
    stdout_buffer: Vec<u8>,
    stderr_buffer: Vec<u8>,
    timed_out: bool,
    killed: bool,
}

impl ProcessExecution {
    fn new(command: &str, cwd: &Path, timeout_ms: u64) -> Self {
        Self {
            command: command.to_string(),
            cwd: cwd.to_path_buf(),
            timeout_ms,
            stdout_buffer: Vec::new(),
            stderr_buffer: Vec::new(),
            timed_out: false,
            killed: false,
        }
    }

    fn record(&mut self, stream: OutputStream, chunk: &[u8]) {
        match stream {
            OutputStream::Stdout => self.stdout_buffer.extend_from_slice(chunk),
            OutputStream::Stderr => self.stderr_buffer.extend_from_slice(chunk),
        }
    }

    fn finalize(self, outcome: ExecOutcome) -> ToolResult {
        let stdout = String::from_utf8_lossy(&self.stdout_buffer);
        let stderr = String::from_utf8_lossy(&self.stderr_buffer);
        outcome.into_result(&stdout, &stderr)
    }
}

/// Kills the child if the run future is dropped before it was reaped.
struct ChildGuard {
    pid: Option<u32>,
}

impl ChildGuard {
    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid {
            signal_child(pid, ChildSignal::Kill);
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum ChildSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_child(pid: u32, signal: ChildSignal) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let signal = match signal {
        ChildSignal::Terminate => Signal::SIGTERM,
        ChildSignal::Kill => Signal::SIGKILL,
    };
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(raw), signal).is_ok()
}

#[cfg(not(unix))]
fn signal_child(_pid: u32, _signal: ChildSignal) -> bool {
    false
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

#[derive(Clone)]
pub struct ProcessSupervisor {
    emitter: Arc<dyn EventEmitter>,
    invalidator: Arc<dyn ContextInvalidator>,
    session_id: String,
    kill_grace_ms: u64,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(Arc::new(NoopEventEmitter))
    }
}

impl ProcessSupervisor {
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            emitter,
            invalidator: Arc::new(NoopContextInvalidator),
            session_id: String::new(),
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn ContextInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Time between SIGTERM and SIGKILL after a timeout.
    pub fn with_kill_grace(mut self, kill_grace_ms: u64) -> Self {
        self.kill_grace_ms = kill_grace_ms;
        self
    }

    pub async fn run(&self, command: &str, cwd: &Path, timeout_ms: u64) -> ToolResult {
        let mut execution = ProcessExecution::new(command, cwd, timeout_ms);
        debug!(command, cwd = %cwd.display(), timeout_ms, "spawning command");

        let mut child = match spawn_shell(command, cwd) {
            Ok(child) => child,
            Err(error) => {
                warn!(command, error = %error, "command failed to spawn");
                return execution.finalize(ExecOutcome::SpawnFailed(error.to_string()));
            }
        };
        let mut guard = ChildGuard { pid: child.id() };

        let (tx, mut rx) = mpsc::unbounded_channel::<(OutputStream, Vec<u8>)>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_chunks(stdout, OutputStream::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_chunks(stderr, OutputStream::Stderr, tx.clone())));
        }
        drop(tx);

        let deadline = sleep(Duration::from_millis(timeout_ms));
        tokio::pin!(deadline);
        let mut kill_timer: Option<Pin<Box<Sleep>>> = None;

        let status = loop {
            tokio::select! {
                Some((stream, chunk)) = rx.recv() => {
                    self.forward(stream, &chunk);
                    execution.record(stream, &chunk);
                }
                status = child.wait() => break status,
                _ = &mut deadline, if !execution.timed_out => {
                    execution.timed_out = true;
                    warn!(
                        command = %execution.command,
                        timeout_ms = execution.timeout_ms,
                        "command timed out; sending SIGTERM"
                    );
                    if let Some(pid) = child.id() {
                        signal_child(pid, ChildSignal::Terminate);
                    }
                    kill_timer = Some(Box::pin(sleep(Duration::from_millis(self.kill_grace_ms))));
                }
                _ = fire(&mut kill_timer) => {
                    kill_timer = None;
                    execution.killed = true;
                    warn!(command = %execution.command, "command ignored SIGTERM; sending SIGKILL");
                    let signalled = child.id().is_some_and(|pid| signal_child(pid, ChildSignal::Kill));
                    if !signalled {
                        let _ = child.start_kill();
                    }
                }
            }
        };

        if !execution.timed_out {
            guard.disarm();
        }

        let drain = async {
            while let Some((stream, chunk)) = rx.recv().await {
                self.forward(stream, &chunk);
                execution.record(stream, &chunk);
            }
        };
        if tokio::time::timeout(Duration::from_millis(IO_DRAIN_TIMEOUT_MS), drain)
            .await
            .is_err()
        {
            debug!(command, "output pipes still open after exit; abandoning readers");
        }
        for reader in readers {
            reader.abort();
        }

        let outcome = match status {
            Ok(status) => ExecOutcome::from_status(status, execution.timed_out, timeout_ms),
            Err(error) => {
                warn!(command, error = %error, "failed to wait for command");
                return execution.finalize(ExecOutcome::SpawnFailed(error.to_string()));
            }
        };
        debug!(
            command,
            outcome = ?outcome,
            killed = execution.killed,
            cwd = %execution.cwd.display(),
            "command finished"
        );

        if outcome.is_success() {
            self.invalidator.invalidate(cwd);
        }
        execution.finalize(outcome)
    }

    fn forward(&self, stream: OutputStream, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        let event = SessionEvent::tool_call_output_delta(self.session_id.clone(), stream, text);
        if let Err(error) = self.emitter.emit(event) {
            debug!(error = %error, "dropping output chunk");
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessSupervisor {
    async fn run(&self, command: &str, cwd: &Path, timeout_ms: u64) -> ToolResult {
        ProcessSupervisor::run(self, command, cwd, timeout_ms).await
    }
}

fn spawn_shell(command: &str, cwd: &Path) -> std::io::Result<Child> {
    #[cfg(unix)]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    };
    #[cfg(not(unix))]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    };

    cmd.current_dir(cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

async fn forward_chunks<R>(
    mut reader: R,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<(OutputStream, Vec<u8>)>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buffer = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send((stream, buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(error) => {
                debug!(stream = stream.as_str(), error = %error, "output read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_exit_with_empty_stdout_has_placeholder() {
        let result = ExecOutcome::Exited(0).into_result("", "noise");
        assert!(!result.is_error());
        assert_eq!(result.result, "Command executed successfully");
    }

    #[test]
    fn non_zero_exit_prefers_trimmed_stderr() {
        let result = ExecOutcome::Exited(2).into_result("partial", "  boom\n");
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.result, "partial");

        let result = ExecOutcome::Exited(7).into_result("", " \n");
        assert_eq!(
            result.error.as_deref(),
            Some("Command failed with exit code 7")
        );
    }

    #[test]
    fn timeout_message_mentions_remediation() {
        let result = ExecOutcome::TimedOut { timeout_ms: 250 }.into_result("", "");
        let error = result.error.expect("timeout should be an error");
        assert!(error.starts_with("Command timed out after 250 ms"));
        assert!(error.contains("increase timeout_ms"));
    }

    #[cfg(unix)]
    #[test]
    fn signal_names_use_conventional_spelling() {
        let result = ExecOutcome::Signaled(9).into_result("", "");
        assert_eq!(
            result.error.as_deref(),
            Some("Command terminated by signal SIGKILL")
        );
    }

    #[test]
    fn timed_out_overrides_exit_status() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let status = ExitStatus::from_raw(0);
            assert_eq!(
                ExecOutcome::from_status(status, true, 10),
                ExecOutcome::TimedOut { timeout_ms: 10 }
            );
            assert_eq!(
                ExecOutcome::from_status(status, false, 10),
                ExecOutcome::Exited(0)
            );
        }
    }
}
