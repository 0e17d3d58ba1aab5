//! Refresh orchestration
//!
//! Owns the "current status" a front end displays and sequences overlapping
//! refreshes: every request takes a sequence number, and a response is only
//! applied if nothing newer has been applied already. A slow fetch can
//! therefore never overwrite the result of a later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::core::{FetchContext, Provider, UsageSnapshot};

/// Title shown before the first refresh lands
pub const TITLE_PENDING: &str = "--";

/// Title shown while the latest refresh failed
pub const TITLE_ERROR: &str = "⚠";

/// What the front end should currently display
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshState {
    /// Last successful snapshot, kept across failures
    pub usage: Option<UsageSnapshot>,
    /// Message from the latest refresh, if it failed
    pub error: Option<String>,
    /// Error tag from the latest refresh, if it failed
    pub error_kind: Option<&'static str>,
    /// Whether any refresh is in flight
    pub refreshing: bool,
    /// Whether the applied snapshot came from a probe that hit its deadline
    pub timed_out: bool,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl RefreshState {
    /// Compact label for a status bar: "--", "14%" or "⚠"
    pub fn status_title(&self) -> String {
        if self.error.is_some() {
            return TITLE_ERROR.to_string();
        }
        match self.usage {
            Some(ref usage) => usage.status_title(),
            None => TITLE_PENDING.to_string(),
        }
    }
}

#[derive(Default)]
struct Shared {
    state: RefreshState,
    applied_seq: u64,
    in_flight: usize,
}

impl Shared {
    fn finish_one(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.state.refreshing = self.in_flight > 0;
    }
}

/// Counts one refresh as in flight until released or dropped.
///
/// A caller that drops `refresh()` mid-fetch (a timeout, a losing
/// `select!` branch) still releases its slot.
struct InFlight<'a> {
    shared: &'a Mutex<Shared>,
    released: bool,
}

impl<'a> InFlight<'a> {
    fn start(shared: &'a Mutex<Shared>) -> Self {
        let mut guard = lock_shared(shared);
        guard.in_flight += 1;
        guard.state.refreshing = true;
        Self {
            shared,
            released: false,
        }
    }

    fn release(&mut self, shared: &mut Shared) {
        if !self.released {
            self.released = true;
            shared.finish_one();
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            lock_shared(self.shared).finish_one();
        }
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives a provider and keeps the displayed state consistent
pub struct RefreshController<P: Provider> {
    provider: P,
    ctx: FetchContext,
    next_seq: AtomicU64,
    shared: Mutex<Shared>,
}

impl<P: Provider> RefreshController<P> {
    pub fn new(provider: P, ctx: FetchContext) -> Self {
        Self {
            provider,
            ctx,
            next_seq: AtomicU64::new(0),
            shared: Mutex::new(Shared::default()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Current state snapshot
    pub fn state(&self) -> RefreshState {
        self.lock().state.clone()
    }

    /// Fetch once and apply the outcome unless a newer one already landed
    pub async fn refresh(&self) -> RefreshState {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut in_flight = InFlight::start(&self.shared);

        tracing::debug!("Refresh #{} started", seq);
        let outcome = self.provider.fetch_usage(&self.ctx).await;

        let mut shared = self.lock();
        in_flight.release(&mut shared);

        if seq < shared.applied_seq {
            tracing::debug!(
                "Discarding stale refresh #{} (#{} already applied)",
                seq,
                shared.applied_seq
            );
            return shared.state.clone();
        }

        shared.applied_seq = seq;
        shared.state.last_refresh = Some(Utc::now());
        match outcome {
            Ok(result) => {
                shared.state.timed_out = result.timed_out;
                shared.state.usage = Some(result.usage);
                shared.state.error = None;
                shared.state.error_kind = None;
            }
            Err(e) => {
                tracing::warn!("{} refresh failed: {}", self.provider.display_name(), e);
                shared.state.error = Some(e.to_string());
                shared.state.error_kind = Some(e.kind());
            }
        }
        shared.state.clone()
    }

    /// Refresh now, then once per `interval`, reporting every applied state.
    ///
    /// Runs until the future is dropped. A zero interval means manual refresh
    /// only, so a single refresh is performed.
    pub async fn run_periodic<F>(&self, interval: Duration, mut on_update: F)
    where
        F: FnMut(&RefreshState),
    {
        if interval.is_zero() {
            let state = self.refresh().await;
            on_update(&state);
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let state = self.refresh().await;
            on_update(&state);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProviderError, ProviderFetchResult};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Call `n` waits `delays[n]` and then reports `n + 1` percent,
    /// or fails when `n` is listed in `failures`.
    struct ScriptedProvider {
        calls: AtomicUsize,
        delays: Vec<Duration>,
        failures: Vec<usize>,
    }

    impl ScriptedProvider {
        fn new(delays: Vec<Duration>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delays,
                failures: Vec::new(),
            }
        }

        fn failing_on(mut self, calls: Vec<usize>) -> Self {
            self.failures = calls;
            self
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn display_name(&self) -> &'static str {
            "Scripted"
        }

        async fn fetch_usage(&self, _ctx: &FetchContext) -> Result<ProviderFetchResult, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.get(call).copied().unwrap_or_default();
            tokio::time::sleep(delay).await;

            if self.failures.contains(&call) {
                return Err(ProviderError::NotAuthenticated);
            }
            let usage = UsageSnapshot::new("KIRO TEST", call as f64, 100.0, (call + 1) as u8);
            Ok(ProviderFetchResult::new(usage, "test"))
        }
    }

    #[test]
    fn test_initial_state() {
        let controller = RefreshController::new(ScriptedProvider::new(vec![]), FetchContext::default());
        let state = controller.state();
        assert!(state.usage.is_none());
        assert!(state.error.is_none());
        assert!(!state.refreshing);
        assert_eq!(state.status_title(), "--");
    }

    #[test]
    fn test_refresh_applies_usage() {
        let controller = RefreshController::new(ScriptedProvider::new(vec![]), FetchContext::default());
        let state = tokio_test::block_on(controller.refresh());

        assert_eq!(state.usage.as_ref().map(|u| u.percent), Some(1));
        assert_eq!(state.status_title(), "1%");
        assert!(state.last_refresh.is_some());
        assert!(!state.refreshing);
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let provider = ScriptedProvider::new(vec![Duration::from_millis(200), Duration::ZERO]);
        let controller = RefreshController::new(provider, FetchContext::default());

        let (slow, fast) = tokio::join!(controller.refresh(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            controller.refresh().await
        });

        // Second request (2%) finished first; the slow first one must not win.
        assert_eq!(fast.usage.as_ref().map(|u| u.percent), Some(2));
        assert!(fast.refreshing);
        assert_eq!(slow.usage.as_ref().map(|u| u.percent), Some(2));
        assert!(!slow.refreshing);
        assert_eq!(controller.state().usage.map(|u| u.percent), Some(2));
    }

    #[tokio::test]
    async fn test_error_keeps_last_usage() {
        let provider = ScriptedProvider::new(vec![]).failing_on(vec![1]);
        let controller = RefreshController::new(provider, FetchContext::default());

        controller.refresh().await;
        let state = controller.refresh().await;
        assert_eq!(state.usage.as_ref().map(|u| u.percent), Some(1));
        assert_eq!(state.error_kind, Some("not_authenticated"));
        assert_eq!(state.status_title(), "⚠");

        let state = controller.refresh().await;
        assert!(state.error.is_none());
        assert_eq!(state.usage.as_ref().map(|u| u.percent), Some(3));
    }

    #[tokio::test]
    async fn test_run_periodic_zero_interval_refreshes_once() {
        let controller = RefreshController::new(ScriptedProvider::new(vec![]), FetchContext::default());
        let mut updates = 0;
        controller.run_periodic(Duration::ZERO, |_| updates += 1).await;
        assert_eq!(updates, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_periodic_refreshes_immediately_and_repeats() {
        let controller = RefreshController::new(ScriptedProvider::new(vec![]), FetchContext::default());
        let mut titles = Vec::new();

        // Ticks land at 0, 100 and 200ms of paused time.
        let _ = tokio::time::timeout(
            Duration::from_millis(250),
            controller.run_periodic(Duration::from_millis(100), |state| {
                titles.push(state.status_title())
            }),
        )
        .await;

        assert_eq!(titles, vec!["1%", "2%", "3%"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_refresh_clears_refreshing() {
        let provider = ScriptedProvider::new(vec![Duration::from_secs(5), Duration::ZERO]);
        let controller = RefreshController::new(provider, FetchContext::default());

        let cancelled = tokio::time::timeout(Duration::from_millis(50), controller.refresh()).await;
        assert!(cancelled.is_err());

        let state = controller.state();
        assert!(!state.refreshing);
        assert!(state.usage.is_none());
        assert!(state.last_refresh.is_none());

        let state = controller.refresh().await;
        assert!(!state.refreshing);
        assert_eq!(state.usage.map(|u| u.percent), Some(2));
    }

    #[tokio::test]
    async fn test_dropped_refresh_keeps_concurrent_one_in_flight() {
        let provider = ScriptedProvider::new(vec![Duration::from_millis(300), Duration::from_secs(5)]);
        let controller = RefreshController::new(provider, FetchContext::default());

        let (kept, _) = tokio::join!(controller.refresh(), async {
            let _ = tokio::time::timeout(Duration::from_millis(50), controller.refresh()).await;
            // The first refresh is still running, so the flag must survive the drop.
            assert!(controller.state().refreshing);
        });

        assert!(!kept.refreshing);
        assert_eq!(kept.usage.map(|u| u.percent), Some(1));
    }
}
