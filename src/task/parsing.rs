//! Checklist parsing for task documents.

use anyhow::{Context, Result};
use regex::Regex;

use super::{Task, TaskStatus};

/// Anchored at column 0: indented items are notes, not tasks.
const TASK_LINE_PATTERN: &str = r"^[-*]\s*\[([ xX~!])\]\s*(.+)$";

/// Compiled checklist matcher.
///
/// # Example
///
/// ```
/// use ralph_loop::task::{TaskParser, TaskStatus};
///
/// let parser = TaskParser::new().unwrap();
/// let tasks = parser.parse("# Plan\n- [ ] Write parser\n- [x] Set up repo\n");
/// assert_eq!(tasks.len(), 2);
/// assert_eq!(tasks[0].status, TaskStatus::Pending);
/// assert_eq!(tasks[0].line_number, 2);
/// ```
#[derive(Debug, Clone)]
pub struct TaskParser {
    task_re: Regex,
}

impl TaskParser {
    /// Compile the checklist pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> Result<Self> {
        let task_re = Regex::new(TASK_LINE_PATTERN).context("Failed to compile task regex")?;
        Ok(Self { task_re })
    }

    /// Parse every task line in document order.
    ///
    /// Lines are numbered from 1 across the whole document, including lines
    /// that are not tasks.
    #[must_use]
    pub fn parse(&self, content: &str) -> Vec<Task> {
        content
            .split('\n')
            .enumerate()
            .filter_map(|(index, line)| self.parse_line(index + 1, line))
            .collect()
    }

    /// Parse a single line, returning `None` for non-task lines.
    #[must_use]
    pub fn parse_line(&self, line_number: usize, line: &str) -> Option<Task> {
        let text = line.strip_suffix('\r').unwrap_or(line);
        let caps = self.task_re.captures(text)?;
        let marker = caps.get(1)?.as_str().chars().next()?;
        let status = TaskStatus::from_marker(marker)?;
        let description = caps.get(2)?.as_str().trim().to_string();

        Some(Task {
            id: format!("task-{}", line_number),
            description,
            status,
            line_number,
            raw_line: line.to_string(),
        })
    }
}

/// Parse tasks from document content with a freshly compiled parser.
///
/// # Errors
///
/// Returns an error if the task pattern fails to compile.
pub fn parse_tasks(content: &str) -> Result<Vec<Task>> {
    Ok(TaskParser::new()?.parse(content))
}
