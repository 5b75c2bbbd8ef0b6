//! Subprocess agent: runs Claude Code (or a compatible CLI) once per request.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use super::{ActivityReporter, AgentRequest, AgentSession};
use crate::config::AgentConfig;
use crate::error::RalphError;

/// Lines of stderr kept for failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// Runs the configured agent CLI, writing the request to its stdin.
///
/// Every line the agent prints on stdout or stderr counts as activity.
#[derive(Debug, Clone)]
pub struct ClaudeAgent {
    command: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl ClaudeAgent {
    pub fn new(command: impl Into<String>, args: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir,
        }
    }

    /// Build from the `[agent]` config section.
    pub fn from_config(config: &AgentConfig, working_dir: PathBuf) -> Self {
        Self::new(config.command.clone(), config.args.clone(), working_dir)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the agent executable can be found.
    #[must_use]
    pub fn is_available(&self) -> bool {
        which::which(&self.command).is_ok()
    }
}

#[async_trait]
impl AgentSession for ClaudeAgent {
    async fn invoke(&self, request: AgentRequest, activity: ActivityReporter) -> Result<()> {
        let program = which::which(&self.command).map_err(|_| RalphError::MissingTool {
            tool: self.command.clone(),
        })?;

        debug!("Invoking {} for {:?} request", self.command, request.kind);

        let mut child = Command::new(program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.command))?;

        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump_lines(out, activity.clone(), false)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump_lines(err, activity.clone(), true)));

        if let Some(mut stdin) = child.stdin.take() {
            let written = match stdin.write_all(request.prompt.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin early", self.command);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let status = child.wait().await.context("Failed to wait for agent")?;

        if let Some(handle) = stdout {
            let _ = handle.await;
        }
        let tail = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if status.success() {
            debug!("{} finished", self.command);
            return Ok(());
        }

        let message = if tail.is_empty() {
            format!("{} exited with {}", self.command, status)
        } else {
            tail.join("\n")
        };
        Err(RalphError::AgentFailed {
            exit_code: status.code(),
            message,
        }
        .into())
    }
}

/// Read lines until EOF, reporting each one. Returns the last stderr lines.
async fn pump_lines<R>(stream: R, activity: ActivityReporter, keep_tail: bool) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    let mut tail = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        activity.record();
        trace!("agent: {}", line);
        if keep_tail {
            if tail.len() == STDERR_TAIL_LINES {
                tail.remove(0);
            }
            tail.push(line);
        }
    }
    tail
}
