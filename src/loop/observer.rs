//! Outward signals from the orchestrator.
//!
//! The orchestrator never renders anything itself. Front ends (the terminal
//! console, tests) implement [`LoopObserver`] and receive every state change
//! in the order it happened.

use crate::history::{SessionTiming, TaskCompletion};
use crate::r#loop::state::LoopStatus;
use crate::task::{Task, TaskStats};

/// Receiver of loop updates.
///
/// Called from the orchestrator task and from timer tasks, so
/// implementations must be cheap and must not block.
pub trait LoopObserver: Send + Sync {
    /// Status changed; `task` is the current task text, if any.
    fn status_changed(&self, status: LoopStatus, iteration: u32, task: Option<&str>);

    /// Review countdown remaining seconds; 0 means cleared.
    fn countdown(&self, remaining: u32);

    /// Full session history after an append or reset.
    fn history_updated(&self, history: &[TaskCompletion]);

    /// Session start, history and pending count.
    fn session_timing(&self, timing: &SessionTiming);

    /// Task counts and the task that would run next.
    fn stats_updated(&self, _stats: &TaskStats, _next: Option<&Task>) {}

    /// A log line; `highlight` marks warnings and failures.
    fn log(&self, message: &str, highlight: bool);

    /// A PRD generation request has been sent to the agent.
    fn prd_generating(&self);

    /// A PRD generation request settled.
    fn prd_ready(&self, _succeeded: bool) {}
}

/// Observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl LoopObserver for NullObserver {
    fn status_changed(&self, _status: LoopStatus, _iteration: u32, _task: Option<&str>) {}
    fn countdown(&self, _remaining: u32) {}
    fn history_updated(&self, _history: &[TaskCompletion]) {}
    fn session_timing(&self, _timing: &SessionTiming) {}
    fn log(&self, _message: &str, _highlight: bool) {}
    fn prd_generating(&self) {}
}
