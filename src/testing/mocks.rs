//! Mock implementations for loop tests.
//!
//! These mocks provide controllable test doubles for the agent and the
//! observer, enabling deterministic tests on tokio's paused clock.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::agent::{ActivityReporter, AgentRequest, AgentSession, RequestKind};
use crate::history::{SessionTiming, TaskCompletion};
use crate::r#loop::state::LoopStatus;
use crate::r#loop::LoopObserver;
use crate::task::{Task, TaskStats};

/// How one mock invocation ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MockOutcome {
    #[default]
    Succeed,
    Fail(String),
    /// Never settles.
    Hang,
    Panic,
}

type SideEffect = Arc<dyn Fn(&AgentRequest) + Send + Sync>;

#[derive(Debug, Default)]
struct MockAgentState {
    outcomes: VecDeque<MockOutcome>,
    requests: Vec<AgentRequest>,
}

/// Mock implementation of the coding agent.
///
/// Clones share the recorded requests and the outcome queue.
///
/// # Example
///
/// ```rust,ignore
/// let agent = MockAgent::new()
///     .with_delay(Duration::from_secs(30))
///     .with_outcomes(vec![MockOutcome::Succeed, MockOutcome::Fail("boom".into())]);
///
/// assert_eq!(agent.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockAgent {
    delay: Duration,
    activity_interval: Option<Duration>,
    default_outcome: MockOutcome,
    side_effect: Option<SideEffect>,
    state: Arc<Mutex<MockAgentState>>,
}

impl fmt::Debug for MockAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockAgent")
            .field("delay", &self.delay)
            .field("activity_interval", &self.activity_interval)
            .field("default_outcome", &self.default_outcome)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl MockAgent {
    /// Create a mock that succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take this long before settling.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report activity at this interval while working.
    #[must_use]
    pub fn with_activity_every(mut self, interval: Duration) -> Self {
        self.activity_interval = Some(interval);
        self
    }

    /// Queue outcomes for the next invocations, in order.
    #[must_use]
    pub fn with_outcomes(self, outcomes: Vec<MockOutcome>) -> Self {
        self.lock().outcomes.extend(outcomes);
        self
    }

    /// Fail every invocation that has no queued outcome.
    #[must_use]
    pub fn with_failure(mut self, message: &str) -> Self {
        self.default_outcome = MockOutcome::Fail(message.to_string());
        self
    }

    /// Never settle unless an outcome is queued.
    #[must_use]
    pub fn with_hang(mut self) -> Self {
        self.default_outcome = MockOutcome::Hang;
        self
    }

    /// Panic unless an outcome is queued.
    #[must_use]
    pub fn with_panic(mut self) -> Self {
        self.default_outcome = MockOutcome::Panic;
        self
    }

    /// Run `effect` just before a successful settle, e.g. to tick a task
    /// off in the PRD the way a real agent would.
    #[must_use]
    pub fn with_side_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(&AgentRequest) + Send + Sync + 'static,
    {
        self.side_effect = Some(Arc::new(effect));
        self
    }

    /// Number of invocations so far.
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.lock().requests.clone()
    }

    /// Prompts of task requests, in order.
    pub fn task_prompts(&self) -> Vec<String> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.kind == RequestKind::Task)
            .map(|r| r.prompt.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockAgentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn work(&self, activity: &ActivityReporter) {
        match self.activity_interval {
            Some(interval) if !interval.is_zero() => {
                let mut remaining = self.delay;
                while !remaining.is_zero() {
                    let step = remaining.min(interval);
                    tokio::time::sleep(step).await;
                    remaining -= step;
                    activity.record();
                }
            }
            _ => {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl AgentSession for MockAgent {
    async fn invoke(&self, request: AgentRequest, activity: ActivityReporter) -> Result<()> {
        let outcome = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            state
                .outcomes
                .pop_front()
                .unwrap_or_else(|| self.default_outcome.clone())
        };

        if outcome == MockOutcome::Hang {
            return std::future::pending().await;
        }
        self.work(&activity).await;

        match outcome {
            MockOutcome::Succeed => {
                if let Some(effect) = &self.side_effect {
                    effect(&request);
                }
                Ok(())
            }
            MockOutcome::Fail(message) => bail!("{}", message),
            MockOutcome::Panic => panic!("mock agent panicked"),
            MockOutcome::Hang => unreachable!("handled above"),
        }
    }
}

/// One signal received by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    Status {
        status: LoopStatus,
        iteration: u32,
        task: Option<String>,
    },
    Countdown(u32),
    History(Vec<TaskCompletion>),
    Timing {
        pending: usize,
        completed: usize,
    },
    Stats {
        stats: TaskStats,
        next: Option<String>,
    },
    Log {
        message: String,
        highlight: bool,
    },
    PrdGenerating,
    PrdReady(bool),
}

/// Observer that records every signal for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: ObservedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Every signal so far, in order.
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Status values in the order they were reported.
    pub fn statuses(&self) -> Vec<LoopStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Status { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Countdown values in the order they were reported.
    pub fn countdown_values(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Countdown(remaining) => Some(remaining),
                _ => None,
            })
            .collect()
    }

    /// The most recently reported history.
    pub fn completions(&self) -> Vec<TaskCompletion> {
        self.events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                ObservedEvent::History(history) => Some(history),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// The most recently reported task statistics.
    pub fn last_stats(&self) -> Option<(TaskStats, Option<String>)> {
        self.events().into_iter().rev().find_map(|e| match e {
            ObservedEvent::Stats { stats, next } => Some((stats, next)),
            _ => None,
        })
    }

    pub fn log_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Log { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Whether any log line contains `needle`.
    pub fn has_log(&self, needle: &str) -> bool {
        self.log_messages().iter().any(|m| m.contains(needle))
    }

    /// Whether any highlighted log line contains `needle`.
    pub fn has_highlighted_log(&self, needle: &str) -> bool {
        self.events().iter().any(|e| {
            matches!(e, ObservedEvent::Log { message, highlight: true } if message.contains(needle))
        })
    }

    /// Results of settled PRD generations.
    pub fn prd_results(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::PrdReady(ok) => Some(ok),
                _ => None,
            })
            .collect()
    }
}

impl LoopObserver for RecordingObserver {
    fn status_changed(&self, status: LoopStatus, iteration: u32, task: Option<&str>) {
        self.record(ObservedEvent::Status {
            status,
            iteration,
            task: task.map(str::to_string),
        });
    }

    fn countdown(&self, remaining: u32) {
        self.record(ObservedEvent::Countdown(remaining));
    }

    fn history_updated(&self, history: &[TaskCompletion]) {
        self.record(ObservedEvent::History(history.to_vec()));
    }

    fn session_timing(&self, timing: &SessionTiming) {
        self.record(ObservedEvent::Timing {
            pending: timing.pending_tasks,
            completed: timing.history.len(),
        });
    }

    fn stats_updated(&self, stats: &TaskStats, next: Option<&Task>) {
        self.record(ObservedEvent::Stats {
            stats: *stats,
            next: next.map(|t| t.description.clone()),
        });
    }

    fn log(&self, message: &str, highlight: bool) {
        self.record(ObservedEvent::Log {
            message: message.to_string(),
            highlight,
        });
    }

    fn prd_generating(&self) {
        self.record(ObservedEvent::PrdGenerating);
    }

    fn prd_ready(&self, succeeded: bool) {
        self.record(ObservedEvent::PrdReady(succeeded));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_agent_outcome_queue() {
        let agent = MockAgent::new().with_outcomes(vec![
            MockOutcome::Fail("first".to_string()),
            MockOutcome::Succeed,
        ]);

        let first = agent
            .invoke(AgentRequest::task("a"), ActivityReporter::noop())
            .await;
        assert_eq!(first.unwrap_err().to_string(), "first");
        assert!(agent
            .invoke(AgentRequest::task("b"), ActivityReporter::noop())
            .await
            .is_ok());
        assert!(agent
            .invoke(AgentRequest::prd_generation("c"), ActivityReporter::noop())
            .await
            .is_ok());

        assert_eq!(agent.call_count(), 3);
        assert_eq!(agent.task_prompts(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_agent_reports_activity() {
        let pulses = Arc::new(Mutex::new(0u32));
        let seen = Arc::clone(&pulses);
        let reporter = ActivityReporter::new(move || {
            *seen.lock().unwrap() += 1;
        });
        let agent = MockAgent::new()
            .with_delay(Duration::from_secs(25))
            .with_activity_every(Duration::from_secs(10));

        agent.invoke(AgentRequest::task("x"), reporter).await.unwrap();
        assert_eq!(*pulses.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_side_effect_runs_on_success() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&hits);
        let agent = MockAgent::new().with_side_effect(move |request| {
            seen.lock().unwrap().push(request.prompt.clone());
        });

        agent
            .invoke(AgentRequest::task("p"), ActivityReporter::noop())
            .await
            .unwrap();
        assert_eq!(*hits.lock().unwrap(), vec!["p".to_string()]);
    }

    #[test]
    fn test_recording_observer_queries() {
        let observer = RecordingObserver::new();
        observer.status_changed(LoopStatus::Running, 1, Some("task"));
        observer.countdown(12);
        observer.log("plain", false);
        observer.log("Something failed", true);
        observer.prd_ready(true);

        assert_eq!(observer.statuses(), vec![LoopStatus::Running]);
        assert_eq!(observer.countdown_values(), vec![12]);
        assert!(observer.has_log("plain"));
        assert!(observer.has_highlighted_log("failed"));
        assert!(!observer.has_highlighted_log("plain"));
        assert_eq!(observer.prd_results(), vec![true]);
        assert!(observer.completions().is_empty());
    }
}
