//! Configuration management for the Ralph loop.
//!
//! Configuration is read from `ralph.toml` in the project directory, falling
//! back to `<config dir>/ralph/config.toml` and then to built-in defaults.
//!
//! # Example ralph.toml
//!
//! ```toml
//! [files]
//! prd_path = "PRD.md"
//! progress_path = "progress.txt"
//!
//! [agent]
//! command = "claude"
//! args = ["-p", "--dangerously-skip-permissions"]
//!
//! [settings]
//! max_iterations = 20
//!
//! [requirements]
//! run_tests = true
//! commit_changes = true
//!
//! [loop]
//! stall_policy = "pause"
//! ```

use crate::error::{RalphError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default cap on iterations per session.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Project-level configuration file name.
pub const CONFIG_FILE_NAME: &str = "ralph.toml";

/// Locations of the task document and progress log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Task document, relative to the project directory.
    pub prd_path: String,
    /// Progress log, relative to the project directory.
    pub progress_path: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            prd_path: "PRD.md".to_string(),
            progress_path: "progress.txt".to_string(),
        }
    }
}

/// Optional replacements for the built-in request templates.
///
/// Empty strings mean "use the built-in template".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub custom_template: String,
    pub custom_prd_generation_template: String,
}

impl PromptConfig {
    /// The custom per-iteration template, if one is set.
    #[must_use]
    pub fn task_template(&self) -> Option<&str> {
        non_blank(&self.custom_template)
    }

    /// The custom PRD generation template, if one is set.
    #[must_use]
    pub fn prd_generation_template(&self) -> Option<&str> {
        non_blank(&self.custom_prd_generation_template)
    }
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// How the coding agent is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Executable to run.
    pub command: String,
    /// Arguments; the request is written to the agent's stdin.
    pub args: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec![
                "-p".to_string(),
                "--dangerously-skip-permissions".to_string(),
            ],
        }
    }
}

/// Loop safety settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RalphSettings {
    /// Iterations per session; 0 means unlimited.
    pub max_iterations: u32,
}

impl Default for RalphSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl RalphSettings {
    /// Whether `completed` iterations reach the configured limit.
    #[must_use]
    pub fn limit_reached(&self, completed: u32) -> bool {
        self.max_iterations > 0 && completed >= self.max_iterations
    }
}

/// Acceptance criteria folded into every agent request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRequirements {
    pub write_tests: bool,
    pub run_tests: bool,
    pub run_type_check: bool,
    pub run_linting: bool,
    pub update_docs: bool,
    pub commit_changes: bool,
}

impl TaskRequirements {
    /// Flag names accepted by [`TaskRequirements::from_names`].
    pub const NAMES: [&'static str; 6] = ["tests", "run-tests", "typecheck", "lint", "docs", "commit"];

    /// Build requirements from short names; unknown names are an error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first unknown flag.
    ///
    /// # Example
    ///
    /// ```
    /// use ralph_loop::config::TaskRequirements;
    ///
    /// let req = TaskRequirements::from_names(["tests", "commit"]).unwrap();
    /// assert!(req.write_tests && req.commit_changes);
    /// assert!(!req.run_linting);
    /// ```
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut req = Self::default();
        for name in names {
            match name.trim() {
                "" | "none" => {}
                "tests" | "write-tests" => req.write_tests = true,
                "run-tests" => req.run_tests = true,
                "typecheck" | "type-check" => req.run_type_check = true,
                "lint" => req.run_linting = true,
                "docs" => req.update_docs = true,
                "commit" => req.commit_changes = true,
                other => {
                    return Err(RalphError::invalid_config(
                        "requirements",
                        format!(
                            "unknown requirement '{}' (expected one of: {})",
                            other,
                            Self::NAMES.join(", ")
                        ),
                    ))
                }
            }
        }
        Ok(req)
    }

    /// Human-readable labels for the enabled flags, in request order.
    #[must_use]
    pub fn enabled_labels(&self) -> Vec<&'static str> {
        [
            (self.write_tests, "Write tests"),
            (self.run_tests, "Run tests"),
            (self.run_type_check, "Type check"),
            (self.run_linting, "Lint"),
            (self.update_docs, "Update docs"),
            (self.commit_changes, "Commit"),
        ]
        .into_iter()
        .filter_map(|(on, label)| on.then_some(label))
        .collect()
    }
}

/// What to do when the agent goes quiet for the inactivity timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StallPolicy {
    /// Log a highlighted warning and keep waiting.
    #[default]
    Warn,
    /// Abandon the iteration and pause the loop.
    Pause,
}

impl std::fmt::Display for StallPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StallPolicy::Warn => write!(f, "warn"),
            StallPolicy::Pause => write!(f, "pause"),
        }
    }
}

/// Loop behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub stall_policy: StallPolicy,
}

/// Complete project configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub files: FilesConfig,
    pub prompt: PromptConfig,
    pub agent: AgentConfig,
    pub settings: RalphSettings,
    pub requirements: TaskRequirements,
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
}

impl ProjectConfig {
    /// Load configuration for a project.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or if the loaded values fail validation.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let candidates = [Some(Self::config_path(project_dir)), Self::user_config_path()];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                debug!("Loading configuration from {}", path.display());
                let config = Self::load_file(&path)?;
                config.validate()?;
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    /// Parse a single configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            RalphError::config_with_path(format!("failed to parse: {}", e), path.to_path_buf())
        })
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty agent command or file path.
    pub fn validate(&self) -> Result<()> {
        if self.agent.command.trim().is_empty() {
            return Err(RalphError::invalid_config("agent.command", "must not be empty"));
        }
        if self.files.prd_path.trim().is_empty() {
            return Err(RalphError::invalid_config("files.prd_path", "must not be empty"));
        }
        if self.files.progress_path.trim().is_empty() {
            return Err(RalphError::invalid_config(
                "files.progress_path",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RalphError::config(e.to_string()))
    }

    /// Project config file path.
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE_NAME)
    }

    /// User-level config file path, if a config directory exists.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ralph").join("config.toml"))
    }

    /// Absolute path of the task document.
    pub fn prd_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.files.prd_path)
    }

    /// Absolute path of the progress log.
    pub fn progress_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.files.progress_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.files.prd_path, "PRD.md");
        assert_eq!(config.files.progress_path, "progress.txt");
        assert_eq!(config.settings.max_iterations, 50);
        assert_eq!(config.requirements, TaskRequirements::default());
        assert_eq!(config.loop_config.stall_policy, StallPolicy::Warn);
        assert_eq!(config.agent.command, "claude");
        assert!(config.prompt.task_template().is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[settings]\nmax_iterations = 5\n\n[requirements]\nrun_tests = true\n\n[loop]\nstall_policy = \"pause\"\n",
        )
        .unwrap();

        let config = ProjectConfig::load(temp.path()).unwrap();
        assert_eq!(config.settings.max_iterations, 5);
        assert!(config.requirements.run_tests);
        assert!(!config.requirements.commit_changes);
        assert_eq!(config.loop_config.stall_policy, StallPolicy::Pause);
        assert_eq!(config.files.prd_path, "PRD.md");
    }

    #[test]
    fn test_negative_max_iterations_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[settings]\nmax_iterations = -1\n").unwrap();

        let err = ProjectConfig::load_file(&path).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_malformed_toml_is_config_error_with_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[settings
max_iterations = 5
").unwrap();

        let err = ProjectConfig::load_file(&path).unwrap_err();
        match &err {
            RalphError::Config { path: Some(p), .. } => assert_eq!(p, &path),
            other => panic!("expected config error, got {:?}", other),
        }
        assert_eq!(err.exit_code(), 7);
        assert!(err.is_precondition());
    }

    #[test]
    fn test_validate_rejects_empty_command() {
        let mut config = ProjectConfig::default();
        config.agent.command = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(RalphError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ProjectConfig::default();
        config.settings.max_iterations = 7;
        config.prompt.custom_template = "Do {{task}}".to_string();
        let text = config.to_toml().unwrap();
        let parsed: ProjectConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.prompt.task_template(), Some("Do {{task}}"));
    }

    #[test]
    fn test_limit_reached() {
        let unlimited = RalphSettings { max_iterations: 0 };
        assert!(!unlimited.limit_reached(10_000));

        let two = RalphSettings { max_iterations: 2 };
        assert!(!two.limit_reached(1));
        assert!(two.limit_reached(2));
        assert!(two.limit_reached(3));
    }

    #[test]
    fn test_requirements_from_names() {
        let req = TaskRequirements::from_names(["lint", "typecheck", "docs"]).unwrap();
        assert!(req.run_linting && req.run_type_check && req.update_docs);
        assert!(!req.write_tests);
        assert_eq!(req.enabled_labels(), vec!["Type check", "Lint", "Update docs"]);

        assert_eq!(
            TaskRequirements::from_names(["none"]).unwrap(),
            TaskRequirements::default()
        );
        assert!(TaskRequirements::from_names(["deploy"]).is_err());
    }

    #[test]
    fn test_paths_join_project_dir() {
        let config = ProjectConfig::default();
        let dir = Path::new("/work");
        assert_eq!(config.prd_path(dir), PathBuf::from("/work/PRD.md"));
        assert_eq!(config.progress_path(dir), PathBuf::from("/work/progress.txt"));
    }
}
