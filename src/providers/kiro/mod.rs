//! Kiro provider implementation
//!
//! Runs `kiro-cli chat --no-interactive /usage` and parses the credit panel
//! it prints. The CLI only draws the bar and colors for a capable terminal,
//! so `TERM` is forced for the child.

pub mod parser;

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::{FetchContext, Provider, ProviderError, ProviderFetchResult};
use crate::runner::{CommandOutput, CommandRunner, RunnerError, RunnerOptions};

/// Executable name looked up on the search path
pub const KIRO_BINARY: &str = "kiro-cli";

/// Arguments requesting the non-interactive usage report
pub const KIRO_USAGE_ARGS: [&str; 3] = ["chat", "--no-interactive", "/usage"];

/// Environment variable naming an explicit `kiro-cli` path
pub const KIRO_BINARY_ENV: &str = "KIRO_CLI_BINARY";

/// Kiro provider
pub struct KiroProvider {
    runner: CommandRunner,
}

impl KiroProvider {
    pub fn new() -> Self {
        Self {
            runner: CommandRunner::new(),
        }
    }

    /// Resolve the executable: explicit path, then `KIRO_CLI_BINARY`, then `PATH`
    pub fn locate_binary(ctx: &FetchContext) -> Result<PathBuf, RunnerError> {
        Self::locate_binary_with(
            ctx,
            std::env::var_os(KIRO_BINARY_ENV),
            std::env::var_os("PATH"),
        )
    }

    /// Same as [`Self::locate_binary`] with the environment passed in
    pub fn locate_binary_with(
        ctx: &FetchContext,
        env_override: Option<OsString>,
        path_var: Option<OsString>,
    ) -> Result<PathBuf, RunnerError> {
        if let Some(ref path) = ctx.binary_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(RunnerError::BinaryNotFound(path.display().to_string()));
        }

        if let Some(path) = env_override.filter(|v| !v.is_empty()).map(PathBuf::from) {
            if path.is_file() {
                return Ok(path);
            }
            tracing::debug!(
                "{} points at missing file {}, searching PATH",
                KIRO_BINARY_ENV,
                path.display()
            );
        }

        path_var
            .and_then(|path_var| CommandRunner::locate_in(KIRO_BINARY, &path_var))
            .ok_or_else(|| RunnerError::BinaryNotFound(KIRO_BINARY.to_string()))
    }

    /// Run the usage report and return whatever it printed
    pub async fn fetch_raw_output(&self, ctx: &FetchContext) -> Result<CommandOutput, ProviderError> {
        let binary = Self::locate_binary(ctx)?;
        tracing::debug!("Using kiro-cli at {}", binary.display());

        let options = RunnerOptions::new()
            .with_timeout(ctx.timeout)
            .with_term(ctx.term.clone())
            .with_args(KIRO_USAGE_ARGS);

        Ok(self.runner.run(&binary, &options).await?)
    }
}

impl Default for KiroProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for KiroProvider {
    fn display_name(&self) -> &'static str {
        "Kiro"
    }

    async fn fetch_usage(&self, ctx: &FetchContext) -> Result<ProviderFetchResult, ProviderError> {
        tracing::debug!("Fetching Kiro usage");

        let output = self.fetch_raw_output(ctx).await?;

        match parser::parse(&output.text) {
            Ok(usage) => {
                if output.timed_out {
                    tracing::warn!("kiro-cli timed out; usage parsed from partial output");
                }
                tracing::info!(
                    "Kiro usage: {} {}% ({} of {})",
                    usage.plan_name,
                    usage.percent,
                    usage.credits_used,
                    usage.credits_total
                );
                Ok(ProviderFetchResult::new(usage, "cli").with_timed_out(output.timed_out))
            }
            // A hung tool that never printed a report is a timeout, not a format change.
            Err(ProviderError::Parse(_)) if output.timed_out => Err(ProviderError::Timeout),
            Err(e) => Err(e),
        }
    }

    async fn detect_version(&self, ctx: &FetchContext) -> Option<String> {
        let binary = Self::locate_binary(ctx).ok()?;
        let options = RunnerOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_term(ctx.term.clone())
            .with_args(["--version"]);

        let output = self.runner.run(&binary, &options).await.ok()?;
        if output.timed_out || output.exit_code != Some(0) {
            return None;
        }

        parser::strip_control_sequences(&output.text)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}
