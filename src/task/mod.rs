//! Task model for PRD checklists.
//!
//! A PRD (the task document) is a plain-text file where each top-level
//! checklist line is a task:
//!
//! ```text
//! - [ ] pending          * [x] complete
//! - [~] in progress      - [!] blocked
//! ```
//!
//! Tasks are re-created on every read. A task's `id` is derived from its line
//! number and is only stable until the document is edited, so callers must
//! re-parse and re-resolve a task before acting on it.

mod parsing;
mod reader;

pub use parsing::{parse_tasks, TaskParser};
pub use reader::PrdReader;

use serde::{Deserialize, Serialize};

/// Status of a checklist item, taken from its bracket marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// `[ ]`
    Pending,
    /// `[~]`
    InProgress,
    /// `[x]` or `[X]`
    Complete,
    /// `[!]`
    Blocked,
}

impl TaskStatus {
    /// Map a bracket marker to a status. Unknown markers are not tasks.
    #[must_use]
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(Self::Pending),
            'x' | 'X' => Some(Self::Complete),
            '~' => Some(Self::InProgress),
            '!' => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Canonical marker character for this status.
    #[must_use]
    pub fn marker(&self) -> char {
        match self {
            Self::Pending => ' ',
            Self::Complete => 'x',
            Self::InProgress => '~',
            Self::Blocked => '!',
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in progress"),
            Self::Complete => write!(f, "complete"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// One checklist item from the task document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Display id (`task-{line}`). Not a durable key.
    pub id: String,
    /// Item text with trailing whitespace removed.
    pub description: String,
    /// Status from the bracket marker.
    pub status: TaskStatus,
    /// 1-based line in the source document.
    pub line_number: usize,
    /// The source line as read.
    pub raw_line: String,
}

/// Aggregate task counts.
///
/// `pending` counts every task that is not complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub completed: usize,
    pub pending: usize,
    pub total: usize,
}

impl TaskStats {
    /// Count tasks by status.
    #[must_use]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Complete)
            .count();
        Self {
            completed,
            pending: tasks.len() - completed,
            total: tasks.len(),
        }
    }

    /// Percentage of tasks complete, rounded. 0 for an empty list.
    #[must_use]
    pub fn percent_complete(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u32
    }
}

/// First task in document order whose status is pending.
///
/// In-progress and blocked tasks are skipped, not waited on.
#[must_use]
pub fn next_pending(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|t| t.status == TaskStatus::Pending)
}
