//! Custom error types for the Ralph loop.
//!
//! Configuration and precondition problems, agent failures and command
//! parsing errors each get their own variants so callers can decide whether
//! to log and carry on, pause the loop, or exit.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Ralph loop operations
#[derive(Error, Debug)]
pub enum RalphError {
    // =========================================================================
    // Configuration / Precondition Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Missing required file
    #[error("Missing required file: {path}")]
    MissingFile { path: PathBuf },

    /// The task document exists but contains no checklist items
    #[error("No tasks found in {path}")]
    EmptyTaskList { path: PathBuf },

    // =========================================================================
    // Loop Errors
    // =========================================================================
    /// Console input did not name a known command
    #[error("Unknown command: {input}")]
    InvalidCommand { input: String },

    /// The orchestrator task has shut down and no longer accepts commands
    #[error("Loop orchestrator is not running")]
    OrchestratorClosed,

    // =========================================================================
    // Agent Errors
    // =========================================================================
    /// The coding agent reported an error instead of completing
    #[error("Agent failed (exit code {exit_code:?}): {message}")]
    AgentFailed {
        exit_code: Option<i32>,
        message: String,
    },

    /// Missing required tool
    #[error("Missing required tool: {tool}")]
    MissingTool { tool: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RalphError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an agent failure without an exit code
    pub fn agent(message: impl Into<String>) -> Self {
        Self::AgentFailed {
            exit_code: None,
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error means the loop was never allowed to start
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidConfig { .. }
                | Self::MissingFile { .. }
                | Self::EmptyTaskList { .. }
        )
    }

    /// Check if this error came from the external agent
    pub fn is_agent_failure(&self) -> bool {
        matches!(self, Self::AgentFailed { .. } | Self::MissingTool { .. })
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AgentFailed { .. } => 3,
            Self::InvalidCommand { .. } => 4,
            Self::MissingFile { .. } | Self::EmptyTaskList { .. } | Self::MissingTool { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for Ralph loop results
pub type Result<T> = std::result::Result<T, RalphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RalphError::EmptyTaskList {
            path: PathBuf::from("PRD.md"),
        };
        assert_eq!(err.to_string(), "No tasks found in PRD.md");

        let err = RalphError::AgentFailed {
            exit_code: Some(2),
            message: "boom".into(),
        };
        assert!(err.to_string().contains("Some(2)"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_is_precondition() {
        assert!(RalphError::config("bad").is_precondition());
        assert!(RalphError::MissingFile {
            path: PathBuf::from("PRD.md")
        }
        .is_precondition());
        assert!(!RalphError::agent("crashed").is_precondition());
    }

    #[test]
    fn test_is_agent_failure() {
        assert!(RalphError::agent("crashed").is_agent_failure());
        assert!(RalphError::MissingTool {
            tool: "claude".into()
        }
        .is_agent_failure());
        assert!(!RalphError::OrchestratorClosed.is_agent_failure());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RalphError::agent("x").exit_code(), 3);
        assert_eq!(
            RalphError::InvalidCommand {
                input: "jump".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(RalphError::config("test").exit_code(), 7);
        assert_eq!(RalphError::invalid_config("max", "nope").exit_code(), 7);
        assert_eq!(RalphError::OrchestratorClosed.exit_code(), 1);
    }

    #[test]
    fn test_config_with_path() {
        let path = PathBuf::from("/test/ralph.toml");
        let err = RalphError::config_with_path("failed to parse", path.clone());
        if let RalphError::Config {
            message,
            path: opt_path,
        } = err
        {
            assert_eq!(message, "failed to parse");
            assert_eq!(opt_path, Some(path));
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: RalphError = io_err.into();
        assert!(matches!(err, RalphError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: RalphError = anyhow::anyhow!("wrapped").into();
        assert!(matches!(err, RalphError::Other(_)));
        assert_eq!(err.to_string(), "wrapped");
    }
}
