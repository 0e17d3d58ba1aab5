//! Logging setup
//!
//! Logs go to stderr so stdout stays clean for text/JSON output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map CLI level names onto tracing filter directives
fn level_directive(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" | "verbose" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" => "error",
        _ => "info",
    }
}

/// Build the filter: explicit level, then `RUST_LOG`, then verbose/default
fn build_filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    if let Some(level) = level {
        return EnvFilter::new(level_directive(level));
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    })
}

/// Install the global subscriber
pub fn init(verbose: bool, json: bool, level: Option<&str>) -> anyhow::Result<()> {
    let filter = build_filter(verbose, level);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
