//! Terminal front end for the loop.
//!
//! [`ConsoleObserver`] prints loop signals as they arrive: a status-bar style
//! line on every status change, the review countdown on a single rewritten
//! line, completions, timing and the session log.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use colored::Colorize;

use crate::history::{SessionTiming, TaskCompletion};
use crate::r#loop::state::LoopStatus;
use crate::r#loop::LoopObserver;
use crate::task::{Task, TaskStats, TaskStatus};
use crate::timer::{format_clock, format_duration};

/// Prints loop updates to the terminal.
#[derive(Debug)]
pub struct ConsoleObserver {
    interactive: bool,
    countdown_shown: AtomicBool,
    history_len: AtomicUsize,
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleObserver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interactive: std::io::stderr().is_terminal(),
            countdown_shown: AtomicBool::new(false),
            history_len: AtomicUsize::new(0),
        }
    }

    fn end_countdown_line(&self) {
        if self.countdown_shown.swap(false, Ordering::SeqCst) && self.interactive {
            eprintln!();
        }
    }
}

impl LoopObserver for ConsoleObserver {
    fn status_changed(&self, status: LoopStatus, iteration: u32, task: Option<&str>) {
        self.end_countdown_line();
        let text = status.status_text(iteration);
        let badge = match status {
            LoopStatus::Idle => text.normal(),
            LoopStatus::Running => text.green().bold(),
            LoopStatus::Waiting => text.cyan(),
            LoopStatus::Paused => text.yellow().bold(),
        };
        match (status, task) {
            (LoopStatus::Running, Some(task)) => println!("{} {} {}", badge, "→".dimmed(), task),
            _ => println!("{}", badge),
        }
    }

    fn countdown(&self, remaining: u32) {
        if remaining == 0 {
            self.end_countdown_line();
            return;
        }
        let first = !self.countdown_shown.swap(true, Ordering::SeqCst);
        if self.interactive {
            eprint!(
                "\r{} next iteration in {:>2}s (pause to intervene) ",
                "Review:".cyan().bold(),
                remaining
            );
            let _ = std::io::stderr().flush();
        } else if first {
            eprintln!(
                "{} next iteration in {}s (pause to intervene)",
                "Review:".cyan().bold(),
                remaining
            );
        }
    }

    fn history_updated(&self, history: &[TaskCompletion]) {
        let previous = self.history_len.swap(history.len(), Ordering::SeqCst);
        if history.len() <= previous {
            return;
        }
        if let Some(last) = history.last() {
            println!(
                "{} #{} {} ({})",
                "✓".green().bold(),
                last.iteration,
                last.task_description,
                format_duration(last.duration_ms)
            );
        }
    }

    fn session_timing(&self, timing: &SessionTiming) {
        let elapsed = u64::try_from(timing.elapsed().as_millis()).unwrap_or(u64::MAX);
        println!(
            "{}",
            format!(
                "   elapsed {}  eta {}  pending {}",
                format_clock(elapsed),
                timing.eta(),
                timing.pending_tasks
            )
            .dimmed()
        );
    }

    fn stats_updated(&self, stats: &TaskStats, next: Option<&Task>) {
        println!("   {}", format_stats(stats, next).dimmed());
    }

    fn log(&self, message: &str, highlight: bool) {
        self.end_countdown_line();
        if highlight {
            eprintln!("{} {}", "Warning:".yellow().bold(), message);
        } else {
            println!("{} {}", "Ralph:".cyan(), message);
        }
    }

    fn prd_generating(&self) {
        println!("{} Generating PRD...", "PRD:".cyan().bold());
    }

    fn prd_ready(&self, succeeded: bool) {
        if succeeded {
            println!("{} PRD ready", "OK".green().bold());
        } else {
            eprintln!("{} PRD generation failed", "Error:".red().bold());
        }
    }
}

/// One-line task summary, e.g. `2/5 tasks complete (40%), next: Add login`.
#[must_use]
pub fn format_stats(stats: &TaskStats, next: Option<&Task>) -> String {
    let summary = format!(
        "{}/{} tasks complete ({}%)",
        stats.completed,
        stats.total,
        stats.percent_complete()
    );
    match next {
        Some(task) => format!("{}, next: {}", summary, task.description),
        None if stats.pending == 0 => format!("{}, all done", summary),
        None => format!("{}, nothing pending", summary),
    }
}

/// Checklist line for `ralph tasks`.
#[must_use]
pub fn format_task_line(task: &Task) -> String {
    let marker = format!("[{}]", task.status.marker());
    let marker = match task.status {
        TaskStatus::Complete => marker.green(),
        TaskStatus::InProgress => marker.cyan(),
        TaskStatus::Blocked => marker.red(),
        TaskStatus::Pending => marker.normal(),
    };
    format!(
        "{} {} {}",
        format!("{:>4}", task.line_number).dimmed(),
        marker,
        task.description
    )
}
