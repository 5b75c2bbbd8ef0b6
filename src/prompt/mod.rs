//! Agent request generation.
//!
//! This module turns a task, the PRD and the acceptance criteria into the
//! text handed to the coding agent:
//!
//! - [`sanitize`] - Cleaning free-text user input before it reaches the agent
//! - [`templates`] - `{{placeholder}}` substitution
//! - [`builder`] - Built-in templates and request assembly
//!
//! # Example
//!
//! ```
//! use ralph_loop::prompt::templates::{apply_template, TemplateVariables};
//!
//! let vars = TemplateVariables::new().with_task("Add login");
//! assert_eq!(apply_template("Do: {{task}}", &vars), "Do: Add login");
//! ```

pub mod builder;
pub mod sanitize;
pub mod templates;

pub use builder::{
    render_requirements, PromptBuilder, DEFAULT_PRD_GENERATION_TEMPLATE, DEFAULT_TASK_TEMPLATE,
};
pub use sanitize::{sanitize_task_description, MAX_TASK_DESCRIPTION_LENGTH};
pub use templates::{apply_template, Placeholder, TemplateVariables};
