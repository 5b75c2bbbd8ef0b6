//! The loop orchestrator.
//!
//! A single task owns all loop state and processes two streams in order:
//! commands from [`LoopHandle`]s and internal events from timers and agent
//! invocations. Deferred events carry the epoch they were created in and are
//! dropped if the loop has moved on since (stop, pause, failure).
//!
//! ```text
//! Idle ──start──> Executing ──agent ok──> AwaitingReview ──12s──> Executing
//!   ^                 │                         │
//!   └──── stop ───────┴── agent error ──> Paused <── pause
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Span};

use super::command::LoopCommand;
use super::observer::LoopObserver;
use super::state::{LoopPhase, LoopState, LoopStatus, RunPhase};
use crate::agent::{ActivityReporter, AgentRequest, AgentSession};
use crate::config::{ProjectConfig, RalphSettings, StallPolicy, TaskRequirements};
use crate::error::{RalphError, Result};
use crate::prompt::{sanitize_task_description, PromptBuilder};
use crate::task::{next_pending, PrdReader, Task, TaskStats};
use crate::timer::{
    format_duration, CountdownTimer, InactivityMonitor, INACTIVITY_CHECK_INTERVAL_MS,
    INACTIVITY_TIMEOUT_MS, REVIEW_COUNTDOWN_SECONDS,
};

/// Queued commands per orchestrator.
const COMMAND_BUFFER: usize = 64;

/// Configuration for the loop orchestrator.
///
/// # Example
///
/// ```
/// use ralph_loop::r#loop::OrchestratorConfig;
/// use std::path::PathBuf;
///
/// let config = OrchestratorConfig::new(PathBuf::from("/tmp/project"))
///     .with_review_countdown(5);
/// assert_eq!(config.prd_path, PathBuf::from("/tmp/project/PRD.md"));
/// ```
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory the agent works in.
    pub workspace: PathBuf,
    pub prd_path: PathBuf,
    pub progress_path: PathBuf,
    pub settings: RalphSettings,
    pub requirements: TaskRequirements,
    pub stall_policy: StallPolicy,
    pub custom_template: Option<String>,
    pub custom_prd_template: Option<String>,
    /// Seconds of review between iterations.
    pub review_countdown: u32,
    pub inactivity_timeout: Duration,
    pub inactivity_check_interval: Duration,
}

impl OrchestratorConfig {
    /// Defaults for a workspace: `PRD.md` and `progress.txt` inside it.
    pub fn new(workspace: PathBuf) -> Self {
        Self {
            prd_path: workspace.join("PRD.md"),
            progress_path: workspace.join("progress.txt"),
            workspace,
            settings: RalphSettings::default(),
            requirements: TaskRequirements::default(),
            stall_policy: StallPolicy::default(),
            custom_template: None,
            custom_prd_template: None,
            review_countdown: REVIEW_COUNTDOWN_SECONDS,
            inactivity_timeout: Duration::from_millis(INACTIVITY_TIMEOUT_MS),
            inactivity_check_interval: Duration::from_millis(INACTIVITY_CHECK_INTERVAL_MS),
        }
    }

    /// Build from a loaded project configuration.
    pub fn from_project(workspace: PathBuf, project: &ProjectConfig) -> Self {
        Self {
            prd_path: project.prd_path(&workspace),
            progress_path: project.progress_path(&workspace),
            settings: project.settings,
            requirements: project.requirements,
            stall_policy: project.loop_config.stall_policy,
            custom_template: project.prompt.task_template().map(str::to_string),
            custom_prd_template: project.prompt.prd_generation_template().map(str::to_string),
            ..Self::new(workspace)
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: RalphSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_requirements(mut self, requirements: TaskRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    #[must_use]
    pub fn with_stall_policy(mut self, policy: StallPolicy) -> Self {
        self.stall_policy = policy;
        self
    }

    #[must_use]
    pub fn with_review_countdown(mut self, seconds: u32) -> Self {
        self.review_countdown = seconds;
        self
    }

    #[must_use]
    pub fn with_inactivity_timings(mut self, timeout: Duration, check_interval: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self.inactivity_check_interval = check_interval;
        self
    }
}

/// Point-in-time view of the loop, published after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSnapshot {
    pub status: LoopStatus,
    /// Completed iterations this session.
    pub iteration: u32,
    pub prd_generating: bool,
    /// PRD generations that have settled.
    pub prd_generations: u32,
    pub last_prd_succeeded: Option<bool>,
    /// Increases with every published change.
    pub revision: u64,
}

/// Cloneable handle for driving an orchestrator.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    commands: mpsc::Sender<LoopCommand>,
    snapshot: watch::Receiver<LoopSnapshot>,
}

impl LoopHandle {
    /// Queue a command.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorClosed` if the orchestrator has stopped running.
    pub async fn send(&self, command: LoopCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RalphError::OrchestratorClosed)
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> LoopSnapshot {
        *self.snapshot.borrow()
    }

    #[must_use]
    pub fn status(&self) -> LoopStatus {
        self.snapshot().status
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// The current snapshot is checked first.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorClosed` if the orchestrator stops first.
    pub async fn wait_until<F>(&self, predicate: F) -> Result<LoopSnapshot>
    where
        F: FnMut(&LoopSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| RalphError::OrchestratorClosed)?;
        Ok(*snapshot)
    }

    /// Receiver for every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoopSnapshot> {
        self.snapshot.clone()
    }
}

/// Deferred results delivered back to the orchestrator task.
#[derive(Debug)]
enum LoopEvent {
    AgentActivity { epoch: u64 },
    AgentSettled { epoch: u64, result: anyhow::Result<()> },
    PrdSettled { result: anyhow::Result<()> },
    CountdownElapsed { epoch: u64 },
    InactivityTimeout { epoch: u64 },
}

/// Drives iterations of the coding agent over the PRD's pending tasks.
pub struct LoopOrchestrator {
    config: OrchestratorConfig,
    state: LoopState,
    reader: PrdReader,
    prompts: PromptBuilder,
    agent: Arc<dyn AgentSession>,
    observer: Arc<dyn LoopObserver>,
    countdown: CountdownTimer,
    monitor: InactivityMonitor,
    commands: mpsc::Receiver<LoopCommand>,
    events: mpsc::UnboundedReceiver<LoopEvent>,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    snapshot: watch::Sender<LoopSnapshot>,
    prd_generations: u32,
    last_prd_succeeded: Option<bool>,
    span: Span,
}

impl fmt::Debug for LoopOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopOrchestrator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("agent", &"<dyn AgentSession>")
            .field("observer", &"<dyn LoopObserver>")
            .finish()
    }
}

impl LoopOrchestrator {
    /// Create an orchestrator and a handle to drive it.
    ///
    /// Nothing happens until [`LoopOrchestrator::run`] is awaited.
    ///
    /// # Errors
    ///
    /// Returns an error if the task parser cannot be built.
    pub fn new(
        config: OrchestratorConfig,
        agent: Arc<dyn AgentSession>,
        observer: Arc<dyn LoopObserver>,
    ) -> Result<(Self, LoopHandle)> {
        let reader = PrdReader::new(&config.prd_path, &config.progress_path)?;
        let prompts = PromptBuilder::new(
            &config.workspace,
            &config.prd_path,
            &config.progress_path,
        )
        .with_custom_template(config.custom_template.as_deref())
        .with_custom_prd_template(config.custom_prd_template.as_deref());

        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events) = mpsc::unbounded_channel();
        let (snapshot, snapshot_rx) = watch::channel(LoopSnapshot::default());
        let state = LoopState::new(config.settings, config.requirements);
        let monitor =
            InactivityMonitor::with_timings(config.inactivity_timeout, config.inactivity_check_interval);

        let orchestrator = Self {
            span: session_span(&state),
            config,
            state,
            reader,
            prompts,
            agent,
            observer,
            countdown: CountdownTimer::new(),
            monitor,
            commands,
            events,
            events_tx,
            snapshot,
            prd_generations: 0,
            last_prd_succeeded: None,
        };
        let handle = LoopHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
        };
        Ok((orchestrator, handle))
    }

    /// Process commands and events until every [`LoopHandle`] is dropped.
    pub async fn run(mut self) {
        debug!("Loop orchestrator started");
        loop {
            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.handle_event(event).await,
                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },
            }
        }
        self.cancel_timers();
        debug!("Loop orchestrator shut down");
    }

    async fn dispatch(&mut self, command: LoopCommand) {
        debug!("Command: {}", command.name());
        match command {
            LoopCommand::Start => self.start().await,
            LoopCommand::Stop => self.stop(),
            LoopCommand::Pause => self.pause(),
            LoopCommand::Resume => self.resume().await,
            LoopCommand::Next => self.step().await,
            LoopCommand::GeneratePrd { description } => self.generate_prd(&description),
            LoopCommand::RequirementsChanged(requirements) => {
                self.state.requirements = requirements;
                let labels = requirements.enabled_labels();
                if labels.is_empty() {
                    self.log("Requirements cleared", false);
                } else {
                    self.log(&format!("Requirements: {}", labels.join(", ")), false);
                }
            }
            LoopCommand::SettingsChanged(settings) => {
                self.state.settings = settings;
                if settings.max_iterations == 0 {
                    self.log("Max iterations: unlimited", false);
                } else {
                    self.log(
                        &format!("Max iterations: {}", settings.max_iterations),
                        false,
                    );
                }
            }
        }
        self.publish();
    }

    async fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::AgentActivity { epoch } => {
                if self.state.is_current(epoch) {
                    self.monitor.record_activity();
                }
            }
            LoopEvent::AgentSettled { epoch, result } => {
                if !self.state.is_current(epoch)
                    || self.state.phase != LoopPhase::Running(RunPhase::Executing)
                {
                    debug!("Ignoring late agent result from epoch {}", epoch);
                    return;
                }
                match result {
                    Ok(()) => self.complete_iteration().await,
                    Err(e) => self.fail_iteration(&format!("Iteration failed: {:#}", e)),
                }
            }
            LoopEvent::CountdownElapsed { epoch } => {
                if self.state.is_current(epoch)
                    && self.state.phase == LoopPhase::Running(RunPhase::AwaitingReview)
                {
                    self.review_elapsed().await;
                }
            }
            LoopEvent::InactivityTimeout { epoch } => {
                if self.state.is_current(epoch)
                    && self.state.phase == LoopPhase::Running(RunPhase::Executing)
                {
                    self.stalled();
                }
            }
            LoopEvent::PrdSettled { result } => self.prd_settled(result).await,
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn start(&mut self) {
        match self.state.phase {
            LoopPhase::Idle => {}
            LoopPhase::Paused => {
                self.log("Loop is paused; use resume or stop", false);
                return;
            }
            LoopPhase::Running(_) => {
                self.log("Loop is already running", false);
                return;
            }
        }
        if self.state.prd_generating {
            self.log("Wait for PRD generation to finish before starting", false);
            return;
        }
        if !self.check_preconditions().await {
            return;
        }

        self.state.begin_session();
        self.span = session_span(&self.state);
        self.observer.history_updated(self.state.history.entries());
        self.log("Starting Ralph loop", false);
        self.execute_next().await;
    }

    fn stop(&mut self) {
        self.cancel_timers();
        self.state.reset();
        self.state.phase = LoopPhase::Idle;
        self.observer.history_updated(self.state.history.entries());
        self.log("Loop stopped", false);
        self.emit_status();
    }

    fn pause(&mut self) {
        if !matches!(self.state.phase, LoopPhase::Running(_)) {
            self.log("Loop is not running", false);
            return;
        }
        self.cancel_timers();
        self.state.step_return = None;
        self.state.phase = LoopPhase::Paused;
        self.log("Loop paused", false);
        self.emit_status();
    }

    async fn resume(&mut self) {
        if self.state.phase != LoopPhase::Paused {
            self.log("Loop is not paused", false);
            return;
        }
        self.log("Resuming Ralph loop", false);
        self.execute_next().await;
    }

    async fn step(&mut self) {
        let origin = self.state.phase;
        if !matches!(origin, LoopPhase::Idle | LoopPhase::Paused) {
            self.log("Pause the loop before stepping", false);
            return;
        }
        if self.state.prd_generating {
            self.log("Wait for PRD generation to finish before stepping", false);
            return;
        }
        if !self.check_preconditions().await {
            return;
        }
        if origin == LoopPhase::Idle {
            self.state.start_clock_if_fresh();
        }
        self.state.step_return = Some(origin);
        self.log("Running a single iteration", false);
        self.execute_next().await;
    }

    fn generate_prd(&mut self, description: &str) {
        if self.state.phase != LoopPhase::Idle {
            self.log("Stop the loop before generating a PRD", false);
            return;
        }
        if self.state.prd_generating {
            self.log("PRD generation already in progress", false);
            return;
        }
        if sanitize_task_description(description).is_empty() {
            self.log("PRD description is empty", true);
            return;
        }

        let prompt = self.prompts.build_prd_prompt(description);
        self.state.prd_generating = true;
        self.observer.prd_generating();
        self.log(
            &format!("Generating PRD at {}", self.config.prd_path.display()),
            false,
        );
        self.publish();

        let agent = Arc::clone(&self.agent);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = invoke_isolated(
                agent,
                AgentRequest::prd_generation(prompt),
                ActivityReporter::noop(),
            )
            .await;
            let _ = events.send(LoopEvent::PrdSettled { result });
        });
    }

    // =========================================================================
    // Iteration lifecycle
    // =========================================================================

    /// Check that the PRD exists and has tasks, logging the problem if not.
    async fn check_preconditions(&mut self) -> bool {
        let problem = match self.reader.read_prd().await {
            Ok(Some(content)) if !self.reader.parse(&content).is_empty() => return true,
            Ok(Some(_)) => RalphError::EmptyTaskList {
                path: self.config.prd_path.clone(),
            },
            Ok(None) => RalphError::MissingFile {
                path: self.config.prd_path.clone(),
            },
            Err(e) => RalphError::Other(e),
        };
        warn!("Cannot start: {}", problem);
        self.log(&problem.to_string(), true);
        self.emit_status();
        false
    }

    /// Enter Executing with the next pending task, or finish if none remain.
    async fn execute_next(&mut self) {
        let tasks = match self.reader.tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                self.log(&format!("Failed to read PRD: {:#}", e), true);
                self.finish();
                return;
            }
        };
        let Some(task) = next_pending(&tasks).cloned() else {
            self.log("No pending tasks remain", false);
            self.emit_stats(&tasks);
            self.finish();
            return;
        };

        let prompt = self.build_prompt(&task).await;
        let epoch = self.state.next_epoch();
        self.state.current_task = Some(task.clone());
        self.state.iteration_started = Some(tokio::time::Instant::now());
        self.state.phase = LoopPhase::Running(RunPhase::Executing);

        let events = self.events_tx.clone();
        self.monitor.start(move || {
            let events = events.clone();
            async move {
                events
                    .send(LoopEvent::InactivityTimeout { epoch })
                    .map_err(|_| anyhow!("loop orchestrator has shut down"))
            }
        });
        self.monitor.set_waiting(true);

        self.log(
            &format!(
                "Iteration {}: {}",
                self.state.iteration + 1,
                task.description
            ),
            false,
        );
        self.emit_status();
        self.emit_stats(&tasks);

        let activity_events = self.events_tx.clone();
        let reporter = ActivityReporter::new(move || {
            let _ = activity_events.send(LoopEvent::AgentActivity { epoch });
        });
        let agent = Arc::clone(&self.agent);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = invoke_isolated(agent, AgentRequest::task(prompt), reporter).await;
            let _ = events.send(LoopEvent::AgentSettled { epoch, result });
        });
    }

    async fn build_prompt(&mut self, task: &Task) -> String {
        let prd = match self.reader.read_prd().await {
            Ok(content) => content.unwrap_or_default(),
            Err(e) => {
                warn!("Could not read PRD for request: {:#}", e);
                String::new()
            }
        };
        let progress = match self.reader.read_progress().await {
            Ok(progress) => progress,
            Err(e) => {
                warn!("Could not read progress log: {:#}", e);
                String::new()
            }
        };
        self.prompts
            .build_task_prompt(task, &prd, &progress, &self.state.requirements)
    }

    async fn complete_iteration(&mut self) {
        let duration = self
            .state
            .iteration_started
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        let description = self
            .state
            .current_task_text()
            .unwrap_or_default()
            .to_string();
        let completion = self.state.record_completion(&description, duration);

        self.monitor.set_waiting(false);
        self.monitor.pause();

        self.observer.history_updated(self.state.history.entries());
        self.log(
            &format!(
                "Completed iteration {} in {}",
                completion.iteration,
                format_duration(completion.duration_ms)
            ),
            false,
        );
        self.refresh_stats().await;

        if let Some(origin) = self.state.step_return.take() {
            self.cancel_timers();
            self.state.phase = origin;
            self.emit_status();
            return;
        }

        self.state.phase = LoopPhase::Running(RunPhase::AwaitingReview);
        self.emit_status();

        let observer = Arc::clone(&self.observer);
        let events = self.events_tx.clone();
        let epoch = self.state.epoch;
        self.countdown
            .start(self.config.review_countdown, move |remaining| {
                observer.countdown(remaining);
                if remaining == 0 {
                    let _ = events.send(LoopEvent::CountdownElapsed { epoch });
                }
            });
    }

    async fn review_elapsed(&mut self) {
        if self.state.limit_reached() {
            self.log(
                &format!(
                    "Reached max iterations ({}); stopping",
                    self.state.settings.max_iterations
                ),
                true,
            );
            self.finish();
            return;
        }
        self.execute_next().await;
    }

    fn fail_iteration(&mut self, message: &str) {
        self.cancel_timers();
        self.state.step_return = None;
        self.state.iteration_started = None;
        self.state.phase = LoopPhase::Paused;
        self.log(message, true);
        self.emit_status();
    }

    fn stalled(&mut self) {
        let quiet = format_duration(
            u64::try_from(self.config.inactivity_timeout.as_millis()).unwrap_or(u64::MAX),
        );
        match self.config.stall_policy {
            StallPolicy::Warn => {
                self.log(&format!("No agent activity for {}", quiet), true);
            }
            StallPolicy::Pause => {
                self.fail_iteration(&format!("No agent activity for {}; pausing", quiet));
            }
        }
    }

    /// Leave Running: back to the step origin if stepping, else Idle.
    fn finish(&mut self) {
        self.cancel_timers();
        self.state.iteration_started = None;
        self.state.phase = self.state.step_return.take().unwrap_or(LoopPhase::Idle);
        if self.state.phase == LoopPhase::Idle {
            self.log("Ralph loop finished", false);
        }
        self.emit_status();
    }

    async fn prd_settled(&mut self, result: anyhow::Result<()>) {
        self.state.prd_generating = false;
        self.prd_generations += 1;
        let succeeded = result.is_ok();
        self.last_prd_succeeded = Some(succeeded);
        match result {
            Ok(()) => {
                self.log(
                    &format!("PRD generated at {}", self.config.prd_path.display()),
                    false,
                );
                self.refresh_stats().await;
            }
            Err(e) => self.log(&format!("PRD generation failed: {:#}", e), true),
        }
        self.observer.prd_ready(succeeded);
        self.publish();
    }

    // =========================================================================
    // Outward signals
    // =========================================================================

    /// Invalidate deferred events and stop both timers.
    fn cancel_timers(&mut self) {
        self.state.next_epoch();
        self.countdown.stop();
        self.monitor.stop();
    }

    fn log(&mut self, message: &str, highlight: bool) {
        self.span.in_scope(|| {
            if highlight {
                warn!("{}", message);
            } else {
                info!("{}", message);
            }
        });
        self.state.push_log(message, highlight);
        self.observer.log(message, highlight);
    }

    fn emit_status(&mut self) {
        let status = self.state.status();
        let iteration = match status {
            LoopStatus::Running => self.state.iteration + 1,
            _ => self.state.iteration,
        };
        self.observer
            .status_changed(status, iteration, self.state.current_task_text());
        self.publish();
    }

    fn emit_stats(&self, tasks: &[Task]) {
        let stats = TaskStats::from_tasks(tasks);
        self.observer.stats_updated(&stats, next_pending(tasks));
        self.observer
            .session_timing(&self.state.session_timing(stats.pending));
    }

    async fn refresh_stats(&mut self) {
        match self.reader.tasks().await {
            Ok(tasks) => self.emit_stats(&tasks),
            Err(e) => debug!("Skipping stats refresh: {:#}", e),
        }
    }

    fn publish(&self) {
        let revision = self.snapshot.borrow().revision + 1;
        self.snapshot.send_replace(LoopSnapshot {
            status: self.state.status(),
            iteration: self.state.iteration,
            prd_generating: self.state.prd_generating,
            prd_generations: self.prd_generations,
            last_prd_succeeded: self.last_prd_succeeded,
            revision,
        });
    }
}

fn session_span(state: &LoopState) -> Span {
    info_span!("session", id = %state.session_id)
}

/// Run one agent invocation, turning a panic into an error.
async fn invoke_isolated(
    agent: Arc<dyn AgentSession>,
    request: AgentRequest,
    activity: ActivityReporter,
) -> anyhow::Result<()> {
    match AssertUnwindSafe(agent.invoke(request, activity))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(_) => Err(anyhow!("agent invocation panicked")),
    }
}
