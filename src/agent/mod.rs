//! The external coding agent.
//!
//! The loop treats the agent as opaque: it hands over one request, hears
//! about activity while the agent works, and is told when the invocation
//! settles. Each invocation is independent; no session is shared between
//! iterations.

mod claude;

pub use claude::ClaudeAgent;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// What an invocation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Work on one task from the PRD.
    Task,
    /// Write a PRD from a free-text description.
    PrdGeneration,
}

/// A single request for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub kind: RequestKind,
    pub prompt: String,
}

impl AgentRequest {
    pub fn task(prompt: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Task,
            prompt: prompt.into(),
        }
    }

    pub fn prd_generation(prompt: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::PrdGeneration,
            prompt: prompt.into(),
        }
    }
}

/// Handle an agent uses to report that it is still producing output.
///
/// Cloning is cheap; every clone reports to the same listener.
#[derive(Clone)]
pub struct ActivityReporter {
    listener: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl ActivityReporter {
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            listener: Some(Arc::new(listener)),
        }
    }

    /// A reporter that discards activity.
    #[must_use]
    pub fn noop() -> Self {
        Self { listener: None }
    }

    /// Signal one unit of new output.
    pub fn record(&self) {
        if let Some(listener) = &self.listener {
            listener();
        }
    }
}

impl fmt::Debug for ActivityReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityReporter")
            .field("listener", &self.listener.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Abstraction over the coding agent.
///
/// Enables testing the loop without spawning real processes.
///
/// # Example
///
/// ```rust,ignore
/// use ralph_loop::agent::{AgentRequest, AgentSession, ActivityReporter};
///
/// async fn run_once(agent: &dyn AgentSession, prompt: &str) -> anyhow::Result<()> {
///     agent.invoke(AgentRequest::task(prompt), ActivityReporter::noop()).await
/// }
/// ```
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Run one invocation to completion.
    ///
    /// Implementations should call `activity.record()` whenever new output
    /// is observed.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent cannot be started or reports failure
    /// instead of completing.
    async fn invoke(&self, request: AgentRequest, activity: ActivityReporter) -> Result<()>;
}
