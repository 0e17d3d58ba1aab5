//! CLI module - command-line interface
//!
//! - `kirobar` - defaults to the usage command
//! - `kirobar watch` - refresh periodically and print each result
//! - `kirobar parse` - parse a saved report without running kiro-cli
//! - `kirobar config` - inspect and initialize the settings file

pub mod config;
pub mod parse;
pub mod usage;
pub mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kirobar::settings::Settings;

/// Exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const PROVIDER_MISSING: i32 = 2;
    pub const PARSE_ERROR: i32 = 3;
    pub const CLI_TIMEOUT: i32 = 4;
    pub const NOT_AUTHENTICATED: i32 = 5;
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("KIROBAR_GIT_COMMIT"),
    ", built ",
    env!("KIROBAR_BUILD_DATE"),
    ")"
);

/// KiroBar - Monitor Kiro credit usage
///
/// Runs `kiro-cli chat --no-interactive /usage` and reports plan, credits and
/// reset date. Defaults to the usage command when no subcommand is given.
#[derive(Parser, Debug)]
#[command(name = "kirobar")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable logs (JSON) to stderr
    #[arg(long = "json-output", global = true)]
    pub json_output: bool,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", global = true, value_parser = ["trace", "verbose", "debug", "info", "warning", "warn", "error", "critical"])]
    pub log_level: Option<String>,

    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Seconds to wait for kiro-cli before killing it
    #[arg(long, global = true, env = "KIROBAR_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Path to the kiro-cli executable (skips the PATH search)
    #[arg(long, global = true)]
    pub binary: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print current credit usage (default command)
    Usage,

    /// Refresh periodically and print every result
    Watch(watch::WatchArgs),

    /// Parse a saved usage report from a file or stdin
    Parse(parse::ParseArgs),

    /// Inspect or initialize the settings file
    Config(config::ConfigArgs),
}

/// Output switches shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub pretty: bool,
    pub use_color: bool,
}

impl Cli {
    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            pretty: self.pretty,
            use_color: !self.no_color && is_terminal(),
        }
    }

    /// Settings from disk with command-line overrides applied
    pub fn effective_settings(&self) -> Settings {
        let mut settings = Settings::load();
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        if let Some(ref binary) = self.binary {
            settings.binary_path = Some(binary.clone());
        }
        settings
    }
}

/// Serialize to JSON honoring `--pretty`
pub fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

/// Check if stdout is a terminal
fn is_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}
