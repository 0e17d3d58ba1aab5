//! Usage snapshot - the structured result of parsing one usage report

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Plan label used when the report does not name one
pub const DEFAULT_PLAN_NAME: &str = "Kiro";

/// Credit total assumed when the report has no credits clause
pub const DEFAULT_CREDITS_TOTAL: f64 = 50.0;

/// Credit usage parsed from a single `kiro-cli` usage report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Plan label, e.g. "KIRO POWER"
    pub plan_name: String,
    /// Credits consumed in the current period
    pub credits_used: f64,
    /// Credits covered by the plan
    pub credits_total: f64,
    /// Percent consumed as printed next to the progress bar (0-100)
    pub percent: u8,
    /// Next reset of the credit period, if the report mentions one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageSnapshot {
    pub fn new(plan_name: impl Into<String>, credits_used: f64, credits_total: f64, percent: u8) -> Self {
        Self {
            plan_name: plan_name.into(),
            credits_used,
            credits_total,
            percent: percent.min(100),
            resets_at: None,
        }
    }

    pub fn with_resets_at(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Credits left before the plan allowance is exhausted
    pub fn credits_remaining(&self) -> f64 {
        (self.credits_total - self.credits_used).max(0.0)
    }

    /// Short label for a status bar, e.g. "14%"
    pub fn status_title(&self) -> String {
        format!("{}%", self.percent)
    }

    /// "1428.4 of 10000 covered in plan"
    pub fn format_credits(&self) -> String {
        format!(
            "{:.1} of {:.0} covered in plan",
            self.credits_used, self.credits_total
        )
    }

    /// Reset date in the local timezone, e.g. "Mar 1"
    pub fn format_reset(&self) -> Option<String> {
        self.resets_at
            .map(|r| r.with_timezone(&Local).format("%b %-d").to_string())
    }

    /// Time until reset relative to `now`, e.g. "3d 4h" or "45m"
    pub fn format_countdown(&self, now: DateTime<Utc>) -> Option<String> {
        let remaining = self.resets_at? - now;
        let minutes = remaining.num_minutes();
        if minutes <= 0 {
            return Some("now".to_string());
        }

        let days = minutes / (24 * 60);
        let hours = (minutes % (24 * 60)) / 60;
        let mins = minutes % 60;

        Some(if days > 0 {
            format!("{}d {}h", days, hours)
        } else if hours > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}m", mins)
        })
    }
}
