//! Stall detection for agent sessions.
//!
//! The monitor keeps a "last activity" timestamp and re-checks it on a fixed
//! interval. When the gap reaches the timeout and the monitor is not paused,
//! the timeout callback runs. Pausing keeps the monitor alive but stops it
//! from judging; resuming restarts the stall clock so paused time never
//! counts against the agent.

use super::{INACTIVITY_CHECK_INTERVAL_MS, INACTIVITY_TIMEOUT_MS};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

type TimeoutCallback = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug)]
struct MonitorState {
    active: bool,
    paused: bool,
    waiting: bool,
    last_activity: Instant,
}

/// Periodic stall detector.
///
/// # Example
///
/// ```rust,ignore
/// let mut monitor = InactivityMonitor::new();
/// monitor.start(|| async {
///     tracing::warn!("agent went quiet");
///     Ok(())
/// });
/// monitor.record_activity(); // agent produced output
/// ```
pub struct InactivityMonitor {
    state: Arc<Mutex<MonitorState>>,
    cancel: Option<CancellationToken>,
    timeout: Duration,
    check_interval: Duration,
}

impl std::fmt::Debug for InactivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InactivityMonitor")
            .field("state", &*self.lock())
            .field("timeout", &self.timeout)
            .field("check_interval", &self.check_interval)
            .finish()
    }
}

impl Default for InactivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl InactivityMonitor {
    /// Create a monitor with the standard 60s timeout and 10s check interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timings(
            Duration::from_millis(INACTIVITY_TIMEOUT_MS),
            Duration::from_millis(INACTIVITY_CHECK_INTERVAL_MS),
        )
    }

    /// Create a monitor with custom timings.
    #[must_use]
    pub fn with_timings(timeout: Duration, check_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                active: false,
                paused: false,
                waiting: false,
                last_activity: Instant::now(),
            })),
            cancel: None,
            timeout,
            check_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the check loop is running (true while paused).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Whether timeout evaluation is suspended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Whether control is currently handed to the agent.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.lock().waiting
    }

    /// Timestamp of the most recent activity or clock reset.
    #[must_use]
    pub fn last_activity_time(&self) -> Instant {
        self.lock().last_activity
    }

    /// Start monitoring; any previous check loop is replaced.
    ///
    /// `on_timeout` failures and panics are logged and never stop the loop.
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&mut self, on_timeout: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Some(previous) = self.cancel.take() {
            previous.cancel();
        }

        {
            let mut state = self.lock();
            state.active = true;
            state.paused = false;
            state.last_activity = Instant::now();
        }

        let callback: TimeoutCallback = Arc::new(move || on_timeout().boxed());
        let cancel = CancellationToken::new();
        tokio::spawn(check_loop(
            Arc::clone(&self.state),
            callback,
            cancel.clone(),
            self.timeout,
            self.check_interval,
        ));
        self.cancel = Some(cancel);
        debug!(
            "Inactivity monitor started (timeout {:?}, checks every {:?})",
            self.timeout, self.check_interval
        );
    }

    /// Cancel the check loop and mark the monitor inactive.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        let mut state = self.lock();
        state.active = false;
        state.paused = false;
        state.waiting = false;
    }

    /// Suspend timeout evaluation without stopping the monitor.
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    /// Resume timeout evaluation with a fresh stall clock.
    pub fn resume(&self) {
        let mut state = self.lock();
        state.paused = false;
        state.last_activity = Instant::now();
    }

    /// Note that the agent produced observable output.
    pub fn record_activity(&self) {
        self.lock().last_activity = Instant::now();
    }

    /// Mark whether control is handed to the agent.
    ///
    /// Entering a waiting window restarts the stall clock so the timeout
    /// measures from the handoff rather than from older activity.
    pub fn set_waiting(&self, waiting: bool) {
        let mut state = self.lock();
        state.waiting = waiting;
        if waiting {
            state.last_activity = Instant::now();
        }
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

async fn check_loop(
    state: Arc<Mutex<MonitorState>>,
    on_timeout: TimeoutCallback,
    cancel: CancellationToken,
    timeout: Duration,
    check_interval: Duration,
) {
    let mut ticker = interval_at(Instant::now() + check_interval, check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let stalled_for = {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            if !guard.active {
                return;
            }
            let idle = guard.last_activity.elapsed();
            if guard.paused || idle < timeout {
                continue;
            }
            // One firing per stall window.
            guard.last_activity = Instant::now();
            idle
        };

        warn!("No agent activity for {}s", stalled_for.as_secs());
        match AssertUnwindSafe(on_timeout()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Inactivity timeout handler failed: {:#}", e),
            Err(_) => error!("Inactivity timeout handler panicked"),
        }
    }
}
