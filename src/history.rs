//! Completed-task history and time estimates.
//!
//! The history is append-only for a session. Averages and ETAs are derived
//! from it on demand; nothing is cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::timer::format_clock;

/// Record of one completed iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    /// Task text as it was when the iteration started.
    pub task_description: String,
    /// Wall-clock completion time.
    pub completed_at: DateTime<Utc>,
    /// Milliseconds spent on the iteration.
    pub duration_ms: u64,
    /// 1-based iteration number.
    pub iteration: u32,
}

impl TaskCompletion {
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Estimated time to finish the remaining tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    /// Average iteration time multiplied by the pending count.
    Remaining(Duration),
    /// Tasks remain but nothing has completed yet.
    Unknown,
    /// No pending tasks.
    Done,
}

impl std::fmt::Display for Eta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eta::Remaining(d) => write!(
                f,
                "{}",
                format_clock(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            ),
            Eta::Unknown => write!(f, "--:--:--"),
            Eta::Done => write!(f, "Done!"),
        }
    }
}

/// Ordered log of completions for the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistory {
    entries: Vec<TaskCompletion>,
}

impl TaskHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, completion: TaskCompletion) {
        self.entries.push(completion);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn entries(&self) -> &[TaskCompletion] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&TaskCompletion> {
        self.entries.last()
    }

    /// Sum of all iteration durations.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(
            self.entries
                .iter()
                .fold(0u64, |total, c| total.saturating_add(c.duration_ms)),
        )
    }

    /// Mean iteration duration, `None` before the first completion.
    #[must_use]
    pub fn average_duration(&self) -> Option<Duration> {
        if self.entries.is_empty() {
            return None;
        }
        let total = u64::try_from(self.total_duration().as_millis()).unwrap_or(u64::MAX);
        let count = u64::try_from(self.entries.len()).unwrap_or(u64::MAX);
        Some(Duration::from_millis(total / count))
    }

    /// Estimate the time left for `pending` tasks.
    ///
    /// # Example
    ///
    /// ```
    /// use ralph_loop::history::{Eta, TaskHistory};
    ///
    /// let history = TaskHistory::new();
    /// assert_eq!(history.eta(3), Eta::Unknown);
    /// assert_eq!(history.eta(0), Eta::Done);
    /// ```
    #[must_use]
    pub fn eta(&self, pending: usize) -> Eta {
        if pending == 0 {
            return Eta::Done;
        }
        match self.average_duration() {
            Some(avg) => {
                let avg_ms = u64::try_from(avg.as_millis()).unwrap_or(u64::MAX);
                let pending = u64::try_from(pending).unwrap_or(u64::MAX);
                Eta::Remaining(Duration::from_millis(avg_ms.saturating_mul(pending)))
            }
            None => Eta::Unknown,
        }
    }
}

impl From<Vec<TaskCompletion>> for TaskHistory {
    fn from(entries: Vec<TaskCompletion>) -> Self {
        Self { entries }
    }
}

/// Session timing snapshot sent to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTiming {
    pub start_time: DateTime<Utc>,
    pub history: TaskHistory,
    pub pending_tasks: usize,
}

impl SessionTiming {
    /// Time since the session started, as of `now`.
    #[must_use]
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.start_time).to_std().unwrap_or_default()
    }

    /// Time since the session started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Utc::now())
    }

    /// ETA for the pending tasks in this snapshot.
    #[must_use]
    pub fn eta(&self) -> Eta {
        self.history.eta(self.pending_tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(iteration: u32, duration_ms: u64) -> TaskCompletion {
        TaskCompletion {
            task_description: format!("task {}", iteration),
            completed_at: Utc::now(),
            duration_ms,
            iteration,
        }
    }

    #[test]
    fn test_average_duration() {
        let mut history = TaskHistory::new();
        assert_eq!(history.average_duration(), None);

        history.push(completion(1, 60_000));
        history.push(completion(2, 120_000));
        assert_eq!(history.average_duration(), Some(Duration::from_secs(90)));
        assert_eq!(history.total_duration(), Duration::from_secs(180));
    }

    #[test]
    fn test_eta_states() {
        let mut history = TaskHistory::new();
        assert_eq!(history.eta(4), Eta::Unknown);
        assert_eq!(history.eta(0), Eta::Done);

        history.push(completion(1, 30_000));
        history.push(completion(2, 90_000));
        assert_eq!(history.eta(3), Eta::Remaining(Duration::from_secs(180)));
        assert_eq!(history.eta(0), Eta::Done);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let mut history = TaskHistory::new();
        history.push(completion(1, u64::MAX));
        history.push(completion(2, u64::MAX));

        assert_eq!(history.total_duration(), Duration::from_millis(u64::MAX));
        assert_eq!(
            history.average_duration(),
            Some(Duration::from_millis(u64::MAX / 2))
        );
        assert_eq!(
            history.eta(usize::MAX),
            Eta::Remaining(Duration::from_millis(u64::MAX))
        );
        assert!(history.eta(3).to_string().ends_with(":51"));
    }

    #[test]
    fn test_eta_display() {
        assert_eq!(Eta::Unknown.to_string(), "--:--:--");
        assert_eq!(Eta::Done.to_string(), "Done!");
        assert_eq!(
            Eta::Remaining(Duration::from_secs(3723)).to_string(),
            "01:02:03"
        );
    }

    #[test]
    fn test_append_order_and_clear() {
        let mut history = TaskHistory::new();
        history.push(completion(1, 1000));
        history.push(completion(2, 2000));
        assert_eq!(history.len(), 2);
        assert_eq!(history.entries()[0].iteration, 1);
        assert_eq!(history.last().unwrap().iteration, 2);

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_session_elapsed() {
        let start = Utc::now();
        let timing = SessionTiming {
            start_time: start,
            history: TaskHistory::new(),
            pending_tasks: 2,
        };
        let later = start + chrono::Duration::seconds(90);
        assert_eq!(timing.elapsed_at(later), Duration::from_secs(90));
        assert_eq!(timing.elapsed_at(start - chrono::Duration::seconds(5)), Duration::ZERO);
        assert_eq!(timing.eta(), Eta::Unknown);
    }

    #[test]
    fn test_completion_serializes() {
        let json = serde_json::to_string(&completion(3, 1500)).unwrap();
        assert!(json.contains("\"iteration\":3"));
        assert!(json.contains("\"duration_ms\":1500"));
    }
}
