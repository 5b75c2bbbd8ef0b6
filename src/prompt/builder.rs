//! Request assembly for the coding agent.
//!
//! Two kinds of request are built here: the per-iteration task request and
//! the one-shot PRD generation request. Both go through the same
//! `{{placeholder}}` substitution, so custom templates from `ralph.toml`
//! can replace either one.

use std::path::{Path, PathBuf};

use crate::config::TaskRequirements;
use crate::prompt::sanitize::sanitize_task_description;
use crate::prompt::templates::{apply_template, TemplateVariables};
use crate::task::Task;

/// Built-in per-iteration request.
pub const DEFAULT_TASK_TEMPLATE: &str = r"You are working autonomously in {{workspace}}.

## Current Task

{{task}}

## Steps

{{requirements}}

Work on this one task only. Do not start other tasks from the PRD.

## PRD

{{prd}}

## Progress So Far

{{progress}}
";

/// Built-in PRD generation request. `{{prd}}` is the file to write.
pub const DEFAULT_PRD_GENERATION_TEMPLATE: &str = r"You are working in {{workspace}}.

Write a product requirements document to {{prd}} for the following project:

{{task}}

Format every unit of work as a markdown checklist item on its own line:

- [ ] Short, concrete task description

Order the tasks so each one can be completed and verified on its own.
Do not implement anything yet; only write the document.
";

/// Render acceptance criteria as a numbered step list.
///
/// # Example
///
/// ```
/// use ralph_loop::config::TaskRequirements;
/// use ralph_loop::prompt::render_requirements;
///
/// let req = TaskRequirements { run_tests: true, ..Default::default() };
/// let steps = render_requirements(&req, "PRD.md", "progress.txt");
/// assert!(steps.starts_with("1. Implement the task"));
/// assert!(steps.contains("2. Run the test suite"));
/// ```
#[must_use]
pub fn render_requirements(
    requirements: &TaskRequirements,
    prd_file: &str,
    progress_file: &str,
) -> String {
    let mut steps = vec!["Implement the task".to_string()];

    if requirements.write_tests {
        steps.push("Write tests covering the new behaviour".to_string());
    }
    if requirements.run_tests {
        steps.push("Run the test suite and fix any failures".to_string());
    }
    if requirements.run_type_check {
        steps.push("Run the type checker and fix any errors".to_string());
    }
    if requirements.run_linting {
        steps.push("Run the linter and fix any warnings".to_string());
    }
    if requirements.update_docs {
        steps.push("Update documentation affected by the change".to_string());
    }
    if requirements.commit_changes {
        steps.push("Commit the changes with a descriptive message".to_string());
    }

    steps.push(format!(
        "Mark the task complete in the PRD by changing its `- [ ]` to `- [x]` in {}",
        prd_file
    ));
    steps.push(format!(
        "Append a short summary of what you did to {}",
        progress_file
    ));

    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds agent requests for one project.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    workspace: PathBuf,
    prd_path: PathBuf,
    progress_path: PathBuf,
    task_template: Option<String>,
    prd_template: Option<String>,
}

impl PromptBuilder {
    pub fn new(
        workspace: impl Into<PathBuf>,
        prd_path: impl Into<PathBuf>,
        progress_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            prd_path: prd_path.into(),
            progress_path: progress_path.into(),
            task_template: None,
            prd_template: None,
        }
    }

    /// Replace the per-iteration template. Blank templates are ignored.
    #[must_use]
    pub fn with_custom_template(mut self, template: Option<&str>) -> Self {
        self.task_template = template
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string);
        self
    }

    /// Replace the PRD generation template. Blank templates are ignored.
    #[must_use]
    pub fn with_custom_prd_template(mut self, template: Option<&str>) -> Self {
        self.prd_template = template
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string);
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn prd_path(&self) -> &Path {
        &self.prd_path
    }

    /// Build the request for one iteration.
    #[must_use]
    pub fn build_task_prompt(
        &self,
        task: &Task,
        prd: &str,
        progress: &str,
        requirements: &TaskRequirements,
    ) -> String {
        let vars = TemplateVariables::new()
            .with_task(task.description.as_str())
            .with_prd(prd)
            .with_progress(progress)
            .with_requirements(render_requirements(
                requirements,
                &file_label(&self.prd_path),
                &file_label(&self.progress_path),
            ))
            .with_workspace(self.workspace.display().to_string());
        apply_template(
            self.task_template
                .as_deref()
                .unwrap_or(DEFAULT_TASK_TEMPLATE),
            &vars,
        )
    }

    /// Build a PRD generation request from a free-text description.
    ///
    /// The description is sanitized first; `{{prd}}` is the target path.
    #[must_use]
    pub fn build_prd_prompt(&self, description: &str) -> String {
        let vars = TemplateVariables::new()
            .with_task(sanitize_task_description(description))
            .with_prd(self.prd_path.display().to_string())
            .with_workspace(self.workspace.display().to_string());
        apply_template(
            self.prd_template
                .as_deref()
                .unwrap_or(DEFAULT_PRD_GENERATION_TEMPLATE),
            &vars,
        )
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
