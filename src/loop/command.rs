//! Commands accepted by the loop orchestrator.

use std::str::FromStr;

use crate::config::{RalphSettings, TaskRequirements};
use crate::error::RalphError;

/// Every input the orchestrator reacts to.
///
/// # Example
///
/// ```
/// use ralph_loop::r#loop::LoopCommand;
///
/// let cmd: LoopCommand = "step".parse().unwrap();
/// assert_eq!(cmd, LoopCommand::Next);
/// assert!("dance".parse::<LoopCommand>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopCommand {
    /// Begin a new session from Idle.
    Start,
    /// Abandon the session and return to Idle.
    Stop,
    /// Suspend a running loop, keeping its history.
    Pause,
    /// Continue a paused loop from the next pending task.
    Resume,
    /// Run exactly one iteration from Idle or Paused.
    Next,
    /// Ask the agent to write a PRD from a description.
    GeneratePrd { description: String },
    /// Replace the acceptance criteria for subsequent iterations.
    RequirementsChanged(TaskRequirements),
    /// Replace the loop settings for subsequent iterations.
    SettingsChanged(RalphSettings),
}

impl LoopCommand {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            LoopCommand::Start => "start",
            LoopCommand::Stop => "stop",
            LoopCommand::Pause => "pause",
            LoopCommand::Resume => "resume",
            LoopCommand::Next => "next",
            LoopCommand::GeneratePrd { .. } => "generatePrd",
            LoopCommand::RequirementsChanged(_) => "requirementsChanged",
            LoopCommand::SettingsChanged(_) => "settingsChanged",
        }
    }
}

impl FromStr for LoopCommand {
    type Err = RalphError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (trimmed, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "start" => Ok(LoopCommand::Start),
            "stop" => Ok(LoopCommand::Stop),
            "pause" => Ok(LoopCommand::Pause),
            "resume" => Ok(LoopCommand::Resume),
            "next" | "step" => Ok(LoopCommand::Next),
            "prd" => Ok(LoopCommand::GeneratePrd {
                description: rest.to_string(),
            }),
            "max" => {
                let max_iterations = rest.parse::<u32>().map_err(|_| {
                    RalphError::invalid_config(
                        "max_iterations",
                        format!("expected a non-negative integer, got '{}'", rest),
                    )
                })?;
                Ok(LoopCommand::SettingsChanged(RalphSettings { max_iterations }))
            }
            "require" => {
                let names = rest.split(|c: char| c == ',' || c.is_whitespace());
                Ok(LoopCommand::RequirementsChanged(
                    TaskRequirements::from_names(names)?,
                ))
            }
            _ => Err(RalphError::InvalidCommand {
                input: trimmed.to_string(),
            }),
        }
    }
}
