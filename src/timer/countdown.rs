//! Restartable one-shot countdown.
//!
//! The countdown reports the full duration synchronously from [`CountdownTimer::start`],
//! then once per second until it reaches zero. [`CountdownTimer::stop`] always
//! delivers a final `0` so observers can reset themselves.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Callback receiving the remaining seconds.
pub type TickCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// Ticks and forced stops are serialized through this lock so a stop can
/// never be overtaken by a late tick.
#[derive(Debug)]
struct CountdownRun {
    active: bool,
    remaining: u32,
}

/// A restartable countdown that ticks once per second.
///
/// # Example
///
/// ```rust,ignore
/// let mut timer = CountdownTimer::new();
/// timer.start(12, |remaining| println!("{remaining}s left"));
/// assert!(timer.is_active());
/// timer.stop(); // prints "0s left"
/// ```
#[derive(Default)]
pub struct CountdownTimer {
    current: Option<Running>,
}

struct Running {
    run: Arc<Mutex<CountdownRun>>,
    cancel: CancellationToken,
    on_tick: TickCallback,
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("active", &self.is_active())
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl CountdownTimer {
    /// Create an inactive timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a countdown is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| lock(&c.run).active)
    }

    /// Seconds left on the current countdown, 0 when inactive.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        match &self.current {
            Some(c) => {
                let run = lock(&c.run);
                if run.active {
                    run.remaining
                } else {
                    0
                }
            }
            None => 0,
        }
    }

    /// Start counting down from `seconds`.
    ///
    /// `on_tick(seconds)` runs before this returns. A countdown already in
    /// progress is cancelled silently and replaced.
    ///
    /// Must be called from within a tokio runtime. `on_tick` must not call
    /// back into this timer.
    pub fn start<F>(&mut self, seconds: u32, on_tick: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.cancel_silently();

        let on_tick: TickCallback = Arc::new(on_tick);
        let run = Arc::new(Mutex::new(CountdownRun {
            active: seconds > 0,
            remaining: seconds,
        }));
        on_tick(seconds);

        let cancel = CancellationToken::new();
        if seconds > 0 {
            tokio::spawn(tick_down(
                Arc::clone(&run),
                Arc::clone(&on_tick),
                cancel.clone(),
            ));
        }

        debug!("Countdown started at {}s", seconds);
        self.current = Some(Running {
            run,
            cancel,
            on_tick,
        });
    }

    /// Cancel the countdown and deliver a final `on_tick(0)`.
    ///
    /// No-op if the timer was never started.
    pub fn stop(&mut self) {
        if let Some(current) = self.current.take() {
            current.cancel.cancel();
            let mut run = lock(&current.run);
            run.active = false;
            run.remaining = 0;
            (current.on_tick)(0);
            debug!("Countdown stopped");
        }
    }

    fn cancel_silently(&mut self) {
        if let Some(current) = self.current.take() {
            current.cancel.cancel();
            lock(&current.run).active = false;
        }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel_silently();
    }
}

fn lock(run: &Mutex<CountdownRun>) -> std::sync::MutexGuard<'_, CountdownRun> {
    run.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn tick_down(run: Arc<Mutex<CountdownRun>>, on_tick: TickCallback, cancel: CancellationToken) {
    let period = Duration::from_secs(1);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let mut state = lock(&run);
                if !state.active {
                    return;
                }
                state.remaining = state.remaining.saturating_sub(1);
                let remaining = state.remaining;
                if remaining == 0 {
                    state.active = false;
                }
                on_tick(remaining);
                if remaining == 0 {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let ticks = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        (ticks, move |n| sink.lock().unwrap().push(n))
    }

    #[tokio::test]
    async fn test_inactive_before_start() {
        let timer = CountdownTimer::new();
        assert!(!timer.is_active());
        assert_eq!(timer.remaining(), 0);
    }

    #[tokio::test]
    async fn test_start_ticks_synchronously() {
        let (ticks, on_tick) = recorder();
        let mut timer = CountdownTimer::new();

        timer.start(5, on_tick);

        assert!(timer.is_active());
        assert_eq!(*ticks.lock().unwrap(), vec![5]);
        timer.stop();
    }

    #[tokio::test]
    async fn test_stop_forces_zero_tick() {
        let (ticks, on_tick) = recorder();
        let mut timer = CountdownTimer::new();

        timer.start(10, on_tick);
        timer.stop();

        assert!(!timer.is_active());
        assert_eq!(ticks.lock().unwrap().last(), Some(&0));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut timer = CountdownTimer::new();
        timer.stop();
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_to_zero() {
        let (ticks, on_tick) = recorder();
        let mut timer = CountdownTimer::new();

        timer.start(3, on_tick);
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![3, 2, 1, 0]);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_running_countdown() {
        let (first, first_tick) = recorder();
        let (second, second_tick) = recorder();
        let mut timer = CountdownTimer::new();

        timer.start(10, first_tick);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        timer.start(2, second_tick);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(*first.lock().unwrap(), vec![10, 9]);
        assert_eq!(*second.lock().unwrap(), vec![2, 1, 0]);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_tracks_ticks() {
        let mut timer = CountdownTimer::new();
        timer.start(12, |_| {});
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(timer.remaining(), 10);
        timer.stop();
        assert_eq!(timer.remaining(), 0);
    }
}
