//! Usage command implementation

use chrono::Utc;
use serde::Serialize;

use kirobar::core::{FetchContext, Provider, ProviderError, ProviderFetchResult, UsageSnapshot};
use kirobar::settings::{Settings, UsageLevel};
use kirobar::KiroProvider;

use super::{to_json, OutputOptions};

/// JSON output payload
#[derive(Debug, Serialize)]
pub struct ProviderPayload<'a> {
    pub provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub result: &'a ProviderFetchResult,
}

/// Error payload for JSON output
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub provider: &'static str,
    pub error: String,
    pub kind: &'static str,
}

impl ErrorPayload {
    pub fn new(error: &ProviderError) -> Self {
        Self {
            provider: "kiro",
            error: error.to_string(),
            kind: error.kind(),
        }
    }
}

/// Run the usage command
pub async fn run(settings: &Settings, output: OutputOptions) -> anyhow::Result<()> {
    let ctx: FetchContext = settings.fetch_context();
    let provider = KiroProvider::new();

    tracing::debug!(
        "Running usage command: timeout={:?}, binary={:?}",
        ctx.timeout,
        ctx.binary_path
    );

    match provider.fetch_usage(&ctx).await {
        Ok(result) => {
            if output.json {
                let version = provider.detect_version(&ctx).await;
                let payload = ProviderPayload {
                    provider: "kiro",
                    version,
                    result: &result,
                };
                println!("{}", to_json(&payload, output.pretty)?);
            } else {
                println!("{}", render_text(&result, settings, output.use_color));
            }
            Ok(())
        }
        Err(e) => {
            if output.json {
                println!("{}", to_json(&ErrorPayload::new(&e), output.pretty)?);
            }
            Err(e.into())
        }
    }
}

/// Render a fetch result as text
pub fn render_text(result: &ProviderFetchResult, settings: &Settings, use_color: bool) -> String {
    let usage = &result.usage;
    let mut lines = Vec::new();

    let header = if use_color {
        format!("\x1b[1mKiro\x1b[0m ({})  {}", result.source_label, usage.plan_name)
    } else {
        format!("Kiro ({})  {}", result.source_label, usage.plan_name)
    };
    lines.push(header);

    let bar = render_progress_bar(usage, settings, 20, use_color);
    lines.push(format!("  Credits: {} {}% used", bar, usage.percent));
    lines.push(format!("           {}", usage.format_credits()));

    if let Some(reset) = usage.format_reset() {
        let countdown = usage
            .format_countdown(Utc::now())
            .map(|c| format!(" (in {})", c))
            .unwrap_or_default();
        lines.push(format!("  Resets:  {}{}", reset, countdown));
    }

    if result.timed_out {
        lines.push("  Note:    kiro-cli timed out; figures come from partial output".to_string());
    }

    lines.join("\n")
}

/// Render a text-based progress bar
fn render_progress_bar(
    usage: &UsageSnapshot,
    settings: &Settings,
    width: usize,
    use_color: bool,
) -> String {
    let filled = ((usage.percent as f64 / 100.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);

    let bar = format!("[{}{}]", "█".repeat(filled), "░".repeat(empty));

    if use_color {
        let color = match settings.usage_level(usage.percent) {
            UsageLevel::Critical => "\x1b[31m", // Red
            UsageLevel::High => "\x1b[33m",     // Yellow
            UsageLevel::Normal => "\x1b[32m",   // Green
        };
        format!("{}{}\x1b[0m", color, bar)
    } else {
        bar
    }
}
