//! Ralph - autonomous coding-agent loop
//!
//! Ralph works through the checklist in a PRD one task at a time, handing
//! each task to a coding agent as a fresh invocation, pausing for a short
//! review window between iterations and watching for stalled agents.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`agent`] - The coding agent abstraction and the Claude Code subprocess
//! - [`config`] - Configuration loading and validation
//! - [`console`] - Terminal front end for the loop
//! - [`error`] - Custom error types and handling
//! - [`history`] - Completed-task history and ETA estimation
//! - [`r#loop`] - The loop orchestrator state machine
//! - [`prompt`] - Sanitization, templates and agent request generation
//! - [`task`] - PRD checklist parsing
//! - [`timer`] - Review countdown and inactivity monitoring
//! - [`testing`] - Testing infrastructure (mocks, fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use ralph_loop::agent::ClaudeAgent;
//! use ralph_loop::config::ProjectConfig;
//! use ralph_loop::console::ConsoleObserver;
//! use ralph_loop::r#loop::{LoopCommand, LoopOrchestrator, OrchestratorConfig};
//!
//! let project = ProjectConfig::load(dir)?;
//! let agent = Arc::new(ClaudeAgent::from_config(&project.agent, dir.to_path_buf()));
//! let (orchestrator, handle) = LoopOrchestrator::new(
//!     OrchestratorConfig::from_project(dir.to_path_buf(), &project),
//!     agent,
//!     Arc::new(ConsoleObserver::new()),
//! )?;
//! tokio::spawn(orchestrator.run());
//! handle.send(LoopCommand::Start).await?;
//! ```

pub mod agent;
pub mod config;
pub mod console;
pub mod error;
pub mod history;
pub mod r#loop;
pub mod prompt;
pub mod task;
pub mod testing;
pub mod timer;

// Re-export commonly used types
pub use error::{RalphError, Result};

// Re-export config types
pub use config::{ProjectConfig, RalphSettings, StallPolicy, TaskRequirements};

// Re-export loop types
pub use r#loop::{
    LoopCommand, LoopHandle, LoopObserver, LoopOrchestrator, LoopSnapshot, LoopStatus,
    OrchestratorConfig,
};

// Re-export task types
pub use task::{Task, TaskStats, TaskStatus};

// Re-export testing types for convenience
pub use testing::{MockAgent, MockOutcome, RecordingObserver};
