//! Command Runner
//!
//! Locates a CLI tool on the search path and runs it non-interactively,
//! capturing stdout and stderr into one buffer under a hard wall-clock deadline.
//! A run that hits the deadline is killed and still yields whatever it printed.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Terminal type that makes TUI-style tools render bars and colors
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Result of running a command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Combined stdout and stderr, in arrival order
    pub text: String,
    /// Whether the deadline was hit and the process was killed
    pub timed_out: bool,
    /// Exit code, when the process exited normally
    pub exit_code: Option<i32>,
}

/// Options for running a command
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Hard deadline measured from process start (default: 20s)
    pub timeout: Duration,
    /// Arguments passed to the command
    pub args: Vec<String>,
    /// Extra environment variables merged over the inherited environment
    pub env: HashMap<String, String>,
    /// Value forced into `TERM`
    pub term: String,
    /// How long to keep draining pipes after the process is gone (default: 250ms)
    pub settle: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            args: Vec::new(),
            env: HashMap::new(),
            term: DEFAULT_TERM.to_string(),
            settle: Duration::from_millis(250),
        }
    }
}

impl RunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Errors from locating or launching a command
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0} not found. Install it or add it to PATH.")]
    BinaryNotFound(String),

    #[error("Failed to launch process: {0}")]
    LaunchFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command Runner
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }

    /// Locate an executable in a `PATH`-style list of directories.
    ///
    /// Directories are searched in listed order and the first executable file
    /// wins. Empty entries are ignored rather than treated as the current
    /// directory.
    pub fn locate_in(tool: &str, path_var: &OsStr) -> Option<PathBuf> {
        let dirs: Vec<PathBuf> = std::env::split_paths(path_var)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        if dirs.is_empty() {
            return None;
        }

        let search_path = std::env::join_paths(dirs).ok()?;
        let cwd = std::env::current_dir().unwrap_or_default();
        which::which_in(tool, Some(search_path), cwd).ok()
    }

    /// Run `binary` to completion or until the deadline, capturing its output
    pub async fn run(
        &self,
        binary: &Path,
        options: &RunnerOptions,
    ) -> Result<CommandOutput, RunnerError> {
        let mut cmd = Command::new(binary);
        cmd.args(&options.args);
        cmd.env("TERM", &options.term);
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        // The tool must never sit waiting on input.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            "Launching {} {:?} (timeout {:?})",
            binary.display(),
            options.args,
            options.timeout
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| RunnerError::LaunchFailed(format!("{}: {}", binary.display(), e)))?;

        // Both pipes feed one channel so the buffer keeps arrival order.
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, tx.clone()));
        }
        drop(tx);

        let (status, timed_out) = match tokio::time::timeout(options.timeout, child.wait()).await {
            Ok(status) => (status?, false),
            Err(_) => {
                tracing::warn!(
                    "{} still running after {:?}, terminating",
                    binary.display(),
                    options.timeout
                );
                if let Err(e) = child.start_kill() {
                    tracing::debug!("Kill failed (process likely exited): {}", e);
                }
                (child.wait().await?, true)
            }
        };

        let buffer = drain_output(rx, &readers, options.settle).await;

        tracing::debug!(
            "{} finished: status={:?}, timed_out={}, {} bytes captured",
            binary.display(),
            status.code(),
            timed_out,
            buffer.len()
        );

        Ok(CommandOutput {
            text: String::from_utf8_lossy(&buffer).into_owned(),
            timed_out,
            exit_code: status.code(),
        })
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect reader output for up to `settle`, then stop the readers.
///
/// Grandchildren can hold the pipes open past our child's exit; their readers
/// are aborted so the pipe fds are released with this run.
async fn drain_output(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    readers: &[JoinHandle<()>],
    settle: Duration,
) -> Vec<u8> {
    let mut buffer = Vec::new();
    let drain = async {
        while let Some(chunk) = rx.recv().await {
            buffer.extend_from_slice(&chunk);
        }
    };
    if tokio::time::timeout(settle, drain).await.is_err() {
        tracing::debug!("Output pipes still open after settle period");
    }

    for reader in readers {
        reader.abort();
    }
    while let Ok(chunk) = rx.try_recv() {
        buffer.extend_from_slice(&chunk);
    }
    buffer
}

/// Forward raw chunks from a pipe until EOF
fn spawn_reader<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Pipe read failed: {}", e);
                    break;
                }
            }
        }
    })
}
