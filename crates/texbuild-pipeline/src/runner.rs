//! Bounded external process execution.
//!
//! Subprocess failures are data: a non-zero exit, a timeout and a spawn error
//! all come back as a [`ProcessOutput`], never as `Err`.

use crate::stage::StageConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use texbuild_core::{decode_lossy, EngineChoice};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How an external process ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessStatus {
    /// The process exited on its own (-1 when killed by a signal).
    Exited { code: i32 },

    /// The bound elapsed and the process was killed.
    TimedOut { limit_secs: u64 },

    /// The process could not be started or awaited.
    Failed { reason: String },
}

impl ProcessStatus {
    pub fn success(&self) -> bool {
        matches!(self, ProcessStatus::Exited { code: 0 })
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, ProcessStatus::TimedOut { .. })
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Exited { code } => write!(f, "exited({code})"),
            ProcessStatus::TimedOut { limit_secs } => write!(f, "timed out after {limit_secs}s"),
            ProcessStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Result of one process invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Stage name.
    pub name: String,

    /// Command line as run.
    pub command: String,

    pub status: ProcessStatus,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stdout followed by stderr, with a note when the process did not exit
    /// on its own.
    pub fn transcript(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        match &self.status {
            ProcessStatus::Exited { .. } => {}
            other => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!("[{}] {}\n", self.command, other));
            }
        }
        out
    }
}

/// Grace period for the readers to drain the pipes after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Bytes read so far from one child pipe, filled by a background task.
struct CapturedStream {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl CapturedStream {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let reader = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        });
        Self { buffer, reader }
    }

    /// Everything read before the pipe closed or the grace period ran out.
    async fn collect(self) -> String {
        let abort = self.reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, self.reader).await.is_err() {
            // A grandchild still holds the pipe open.
            abort.abort();
        }
        self.buffer
            .lock()
            .map(|buf| decode_lossy(&buf))
            .unwrap_or_default()
    }
}

/// Runs a [`StageConfig`] to completion or until its bound elapses.
pub struct ProcessRunner;

impl ProcessRunner {
    /// Execute a single stage and return its output.
    ///
    /// The child has stdin closed and is killed if the timeout elapses. Output
    /// printed before the kill is kept.
    pub async fn execute(config: &StageConfig) -> ProcessOutput {
        let start = Instant::now();
        let command_line = config.command_line();
        let finish = |status: ProcessStatus, stdout: String, stderr: String| ProcessOutput {
            name: config.name.clone(),
            command: command_line.clone(),
            status,
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let Some((exe, args)) = config.command.split_first() else {
            let reason = format!("stage {} has empty command", config.name);
            return finish(ProcessStatus::Failed { reason }, String::new(), String::new());
        };

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        debug!(stage = %config.name, command = %command_line, "Spawning process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(stage = %config.name, error = %e, "Failed to spawn process");
                let reason = e.to_string();
                return finish(ProcessStatus::Failed { reason }, String::new(), String::new());
            }
        };
        let stdout = CapturedStream::spawn(child.stdout.take());
        let stderr = CapturedStream::spawn(child.stderr.take());

        let limit = Duration::from_secs(config.timeout_secs);
        let waited = tokio::time::timeout(limit, child.wait()).await;
        let status = match waited {
            Ok(Ok(exit)) => ProcessStatus::Exited {
                code: exit.code().unwrap_or(-1),
            },
            Ok(Err(e)) => ProcessStatus::Failed {
                reason: e.to_string(),
            },
            Err(_elapsed) => {
                warn!(
                    stage = %config.name,
                    timeout_secs = config.timeout_secs,
                    "Process timed out and was killed"
                );
                if let Err(e) = child.kill().await {
                    warn!(stage = %config.name, error = %e, "Failed to kill process");
                }
                ProcessStatus::TimedOut {
                    limit_secs: config.timeout_secs,
                }
            }
        };

        let (stdout, stderr) = tokio::join!(stdout.collect(), stderr.collect());
        finish(status, stdout, stderr)
    }
}

/// Outcome of one engine pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassOutcome {
    /// 1-based pass index.
    pub pass: u8,

    pub engine: EngineChoice,

    /// Bound the pass ran under.
    pub timeout_secs: u64,

    pub output: ProcessOutput,
}

impl PassOutcome {
    pub fn success(&self) -> bool {
        self.output.success()
    }

    pub fn timed_out(&self) -> bool {
        self.output.status.timed_out()
    }

    pub fn transcript(&self) -> String {
        self.output.transcript()
    }
}

/// Invokes an engine over the entry document.
pub struct PassRunner<'a> {
    binaries: &'a crate::config::EngineBinaries,
    halt_on_error: bool,
}

impl<'a> PassRunner<'a> {
    pub fn new(config: &'a crate::config::CompileConfig) -> Self {
        Self {
            binaries: &config.engines,
            halt_on_error: config.halt_on_error,
        }
    }

    /// Run pass `pass` of `engine` over `entry_file` inside `working_dir`.
    pub async fn run(
        &self,
        engine: EngineChoice,
        working_dir: &Path,
        entry_file: &str,
        pass: u8,
        timeout: Duration,
    ) -> PassOutcome {
        let stage = StageConfig::engine_pass(
            self.binaries.binary(engine),
            entry_file,
            working_dir.to_path_buf(),
            timeout.as_secs(),
            self.halt_on_error,
        );
        let output = ProcessRunner::execute(&stage).await;
        PassOutcome {
            pass,
            engine,
            timeout_secs: stage.timeout_secs,
            output,
        }
    }
}
