//! KiroBar - credit usage monitoring for Kiro
//!
//! Runs `kiro-cli` for its usage report and turns the terminal-formatted
//! panel into a [`core::UsageSnapshot`]:
//! - [`runner`] locates and runs the CLI under a hard deadline
//! - [`providers::kiro`] parses the report and exposes the async fetch
//! - [`refresh`] sequences refreshes for long-running front ends

pub mod core;
pub mod logging;
pub mod providers;
pub mod refresh;
pub mod runner;
pub mod settings;

pub use crate::core::{FetchContext, Provider, ProviderError, ProviderFetchResult, UsageSnapshot};
pub use providers::KiroProvider;

/// Fetch a usage snapshot with default settings
pub async fn fetch_usage() -> Result<UsageSnapshot, ProviderError> {
    let result = KiroProvider::new().fetch_usage(&FetchContext::default()).await?;
    Ok(result.usage)
}
