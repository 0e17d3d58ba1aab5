//! Watch command - periodic refresh with one output line per result

use chrono::Local;
use clap::Args;
use std::time::Duration;

use kirobar::refresh::{RefreshController, RefreshState};
use kirobar::settings::Settings;
use kirobar::KiroProvider;

use super::{to_json, OutputOptions};

/// Arguments for the watch command
#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Seconds between refreshes (0 = refresh once); defaults to the settings value
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Run the watch command until Ctrl-C
pub async fn run(args: WatchArgs, settings: &Settings, output: OutputOptions) -> anyhow::Result<()> {
    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.refresh_interval());
    let controller = RefreshController::new(KiroProvider::new(), settings.fetch_context());

    tracing::info!("Watching Kiro usage every {:?}", interval);

    let mut write_error = None;
    let on_update = |state: &RefreshState| {
        if write_error.is_some() {
            return;
        }
        let line = if output.json {
            to_json(state, false)
        } else {
            Ok(render_line(state))
        };
        match line {
            Ok(line) => println!("{}", line),
            Err(e) => write_error = Some(e),
        }
    };

    tokio::select! {
        _ = controller.run_periodic(interval, on_update) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("Interrupted, stopping watch");
        }
    }

    match write_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// One status line, e.g. "[10:42:07] 14%  KIRO POWER  1428.4 of 10000 covered in plan"
pub fn render_line(state: &RefreshState) -> String {
    let time = state
        .last_refresh
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    match (&state.error, &state.usage) {
        (Some(error), _) => format!("[{}] {}  {}", time, state.status_title(), error),
        (None, Some(usage)) => format!(
            "[{}] {}  {}  {}",
            time,
            state.status_title(),
            usage.plan_name,
            usage.format_credits()
        ),
        (None, None) => format!("[{}] {}", time, state.status_title()),
    }
}
