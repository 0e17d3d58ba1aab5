//! Provider trait - the asynchronous fetch contract consumed by the front ends

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::UsageSnapshot;
use crate::runner::{RunnerError, DEFAULT_TERM};

/// Errors that can occur when fetching usage
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The CLI tool is not on the search path
    #[error("{0} not found. Install it or add it to PATH.")]
    NotInstalled(String),

    /// The CLI tool reports that nobody is logged in
    #[error("Not logged in. Run `kiro-cli login` and try again.")]
    NotAuthenticated,

    /// The captured text does not look like a usage report
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to launch process: {0}")]
    LaunchFailed(String),

    /// The tool hung and left nothing usable behind
    #[error("Timed out waiting for usage report")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Stable short tag for machine-readable output
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotInstalled(_) => "not_installed",
            ProviderError::NotAuthenticated => "not_authenticated",
            ProviderError::Parse(_) => "parse_failed",
            ProviderError::LaunchFailed(_) => "launch_failed",
            ProviderError::Timeout => "timeout",
            ProviderError::Io(_) => "io",
            ProviderError::Other(_) => "other",
        }
    }
}

impl From<RunnerError> for ProviderError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::BinaryNotFound(name) => ProviderError::NotInstalled(name),
            RunnerError::LaunchFailed(msg) => ProviderError::LaunchFailed(msg),
            RunnerError::Io(e) => ProviderError::Io(e),
        }
    }
}

/// Context passed to provider fetch operations
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Hard deadline for the CLI probe
    pub timeout: Duration,

    /// Explicit executable path, skipping the search path
    pub binary_path: Option<PathBuf>,

    /// Value forced into `TERM` for the child
    pub term: String,
}

impl Default for FetchContext {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            binary_path: None,
            term: DEFAULT_TERM.to_string(),
        }
    }
}

impl FetchContext {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_binary_path(mut self, path: PathBuf) -> Self {
        self.binary_path = Some(path);
        self
    }
}

/// Successful fetch result
#[derive(Debug, Clone, Serialize)]
pub struct ProviderFetchResult {
    pub usage: UsageSnapshot,
    /// Human-readable source label, e.g. "cli"
    pub source_label: String,
    pub fetched_at: DateTime<Utc>,
    /// The probe was killed at its deadline and parsed from partial output
    pub timed_out: bool,
}

impl ProviderFetchResult {
    pub fn new(usage: UsageSnapshot, source_label: impl Into<String>) -> Self {
        Self {
            usage,
            source_label: source_label.into(),
            fetched_at: Utc::now(),
            timed_out: false,
        }
    }

    pub fn with_timed_out(mut self, timed_out: bool) -> Self {
        self.timed_out = timed_out;
        self
    }
}

/// Trait that usage providers implement
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name, e.g. "Kiro"
    fn display_name(&self) -> &'static str;

    /// Fetch a fresh usage snapshot
    async fn fetch_usage(&self, ctx: &FetchContext) -> Result<ProviderFetchResult, ProviderError>;

    /// Detect the version of the CLI tool (if applicable)
    async fn detect_version(&self, _ctx: &FetchContext) -> Option<String> {
        None
    }
}
