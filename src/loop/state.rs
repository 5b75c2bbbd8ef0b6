//! Loop state types and transitions.
//!
//! [`LoopState`] is the single owner of the iteration counter, history and
//! current phase. Only the orchestrator mutates it, and only from its own
//! event loop; timers and agent callbacks send events instead of touching
//! it directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{RalphSettings, TaskRequirements};
use crate::history::{SessionTiming, TaskCompletion, TaskHistory};
use crate::task::Task;

/// Log lines kept in memory per session.
const MAX_LOG_LINES: usize = 500;

/// Externally visible loop status.
///
/// # Example
///
/// ```
/// use ralph_loop::r#loop::state::LoopStatus;
///
/// assert_eq!(LoopStatus::Running.status_text(3), "Ralph: Running #3");
/// assert_eq!(LoopStatus::Idle.to_string(), "idle");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    #[default]
    Idle,
    Running,
    /// Review countdown between iterations.
    Waiting,
    Paused,
}

impl LoopStatus {
    /// Short status-bar text.
    #[must_use]
    pub fn status_text(&self, iteration: u32) -> String {
        match self {
            LoopStatus::Idle => "Ralph".to_string(),
            LoopStatus::Running => format!("Ralph: Running #{}", iteration),
            LoopStatus::Waiting => "Ralph: Waiting".to_string(),
            LoopStatus::Paused => "Ralph: Paused".to_string(),
        }
    }

    /// Whether an iteration or countdown is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, LoopStatus::Running | LoopStatus::Waiting)
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopStatus::Idle => write!(f, "idle"),
            LoopStatus::Running => write!(f, "running"),
            LoopStatus::Waiting => write!(f, "waiting"),
            LoopStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Sub-phase of a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// The agent is working on a task.
    Executing,
    /// The review countdown is running.
    AwaitingReview,
}

/// Internal state machine phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopPhase {
    #[default]
    Idle,
    Running(RunPhase),
    Paused,
}

impl LoopPhase {
    #[must_use]
    pub fn status(&self) -> LoopStatus {
        match self {
            LoopPhase::Idle => LoopStatus::Idle,
            LoopPhase::Running(RunPhase::Executing) => LoopStatus::Running,
            LoopPhase::Running(RunPhase::AwaitingReview) => LoopStatus::Waiting,
            LoopPhase::Paused => LoopStatus::Paused,
        }
    }
}

/// One line of the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub message: String,
    pub highlight: bool,
}

/// State of the automation loop.
///
/// # Example
///
/// ```
/// use ralph_loop::r#loop::state::{LoopState, LoopStatus};
///
/// let state = LoopState::default();
/// assert_eq!(state.iteration, 0);
/// assert_eq!(state.status(), LoopStatus::Idle);
/// ```
#[derive(Debug, Clone)]
pub struct LoopState {
    pub phase: LoopPhase,
    /// Completed iterations this session.
    pub iteration: u32,
    pub history: TaskHistory,
    pub session_start: DateTime<Utc>,
    pub session_id: Uuid,
    /// Task the agent is (or was last) working on.
    pub current_task: Option<Task>,
    /// Generation counter; deferred results from older epochs are dropped.
    pub epoch: u64,
    /// Phase to return to after a single step.
    pub step_return: Option<LoopPhase>,
    pub iteration_started: Option<tokio::time::Instant>,
    pub requirements: TaskRequirements,
    pub settings: RalphSettings,
    pub prd_generating: bool,
    pub logs: Vec<LogLine>,
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new(RalphSettings::default(), TaskRequirements::default())
    }
}

impl LoopState {
    #[must_use]
    pub fn new(settings: RalphSettings, requirements: TaskRequirements) -> Self {
        Self {
            phase: LoopPhase::Idle,
            iteration: 0,
            history: TaskHistory::new(),
            session_start: Utc::now(),
            session_id: Uuid::new_v4(),
            current_task: None,
            epoch: 0,
            step_return: None,
            iteration_started: None,
            requirements,
            settings,
            prd_generating: false,
            logs: Vec::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> LoopStatus {
        self.phase.status()
    }

    /// Start a fresh session: new id and start time, empty history.
    pub fn begin_session(&mut self) {
        self.reset();
        self.session_id = Uuid::new_v4();
    }

    /// Restart the session clock when nothing has run since the last reset.
    pub fn start_clock_if_fresh(&mut self) {
        if self.history.is_empty() && self.iteration_started.is_none() {
            self.session_start = Utc::now();
        }
    }

    /// Discard the session's counter, history, logs and in-flight task.
    /// The session clock restarts.
    pub fn reset(&mut self) {
        self.session_start = Utc::now();
        self.iteration = 0;
        self.history.clear();
        self.current_task = None;
        self.step_return = None;
        self.iteration_started = None;
        self.logs.clear();
    }

    /// Invalidate every outstanding deferred result.
    pub fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Whether a deferred result from `epoch` still applies.
    #[must_use]
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Count a finished iteration and append it to the history.
    pub fn record_completion(&mut self, task_description: &str, duration: Duration) -> TaskCompletion {
        self.iteration += 1;
        let completion = TaskCompletion {
            task_description: task_description.to_string(),
            completed_at: Utc::now(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            iteration: self.iteration,
        };
        self.history.push(completion.clone());
        completion
    }

    /// Whether the configured iteration limit is used up.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        self.settings.limit_reached(self.iteration)
    }

    pub fn push_log(&mut self, message: &str, highlight: bool) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.remove(0);
        }
        self.logs.push(LogLine {
            at: Utc::now(),
            message: message.to_string(),
            highlight,
        });
    }

    #[must_use]
    pub fn session_timing(&self, pending_tasks: usize) -> SessionTiming {
        SessionTiming {
            start_time: self.session_start,
            history: self.history.clone(),
            pending_tasks,
        }
    }

    /// Description of the current task, if any.
    #[must_use]
    pub fn current_task_text(&self) -> Option<&str> {
        self.current_task.as_ref().map(|t| t.description.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(LoopStatus::Idle.status_text(0), "Ralph");
        assert_eq!(LoopStatus::Running.status_text(2), "Ralph: Running #2");
        assert_eq!(LoopStatus::Waiting.status_text(2), "Ralph: Waiting");
        assert_eq!(LoopStatus::Paused.status_text(2), "Ralph: Paused");
    }

    #[test]
    fn test_phase_maps_to_status() {
        assert_eq!(LoopPhase::Idle.status(), LoopStatus::Idle);
        assert_eq!(
            LoopPhase::Running(RunPhase::Executing).status(),
            LoopStatus::Running
        );
        assert_eq!(
            LoopPhase::Running(RunPhase::AwaitingReview).status(),
            LoopStatus::Waiting
        );
        assert_eq!(LoopPhase::Paused.status(), LoopStatus::Paused);
        assert!(LoopStatus::Waiting.is_active());
        assert!(!LoopStatus::Paused.is_active());
    }

    #[test]
    fn test_record_completion_numbers_from_one() {
        let mut state = LoopState::default();
        let first = state.record_completion("a", Duration::from_secs(3));
        let second = state.record_completion("b", Duration::from_millis(1500));

        assert_eq!(first.iteration, 1);
        assert_eq!(second.iteration, 2);
        assert_eq!(second.duration_ms, 1500);
        assert_eq!(state.iteration, 2);
        assert_eq!(state.history.len(), 2);
    }

    #[test]
    fn test_limit_reached() {
        let mut state = LoopState::new(
            RalphSettings { max_iterations: 1 },
            TaskRequirements::default(),
        );
        assert!(!state.limit_reached());
        state.record_completion("a", Duration::ZERO);
        assert!(state.limit_reached());
    }

    #[test]
    fn test_epoch_invalidates_old_results() {
        let mut state = LoopState::default();
        let old = state.next_epoch();
        assert!(state.is_current(old));
        state.next_epoch();
        assert!(!state.is_current(old));
    }

    #[test]
    fn test_begin_session_resets() {
        let mut state = LoopState::default();
        let old_id = state.session_id;
        state.record_completion("a", Duration::ZERO);
        state.push_log("hello", false);

        state.begin_session();
        assert_eq!(state.iteration, 0);
        assert!(state.history.is_empty());
        assert!(state.logs.is_empty());
        assert_ne!(state.session_id, old_id);
    }

    #[test]
    fn test_reset_restarts_session_clock() {
        let mut state = LoopState::default();
        let stale = Utc::now() - chrono::Duration::hours(1);
        state.session_start = stale;

        state.reset();
        assert!(state.session_start > stale);
        assert!(state.session_timing(3).start_time > stale);
    }

    #[test]
    fn test_clock_only_restarts_for_fresh_session() {
        let mut state = LoopState::default();
        let stale = Utc::now() - chrono::Duration::hours(1);
        state.session_start = stale;
        state.start_clock_if_fresh();
        assert!(state.session_start > stale);

        state.session_start = stale;
        state.record_completion("a", Duration::ZERO);
        state.start_clock_if_fresh();
        assert_eq!(state.session_start, stale);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = LoopState::default();
        for i in 0..(MAX_LOG_LINES + 5) {
            state.push_log(&format!("line {}", i), false);
        }
        assert_eq!(state.logs.len(), MAX_LOG_LINES);
        assert_eq!(state.logs[0].message, "line 5");
    }
}
