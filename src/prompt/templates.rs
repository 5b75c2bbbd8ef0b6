//! Placeholder substitution for agent request templates.
//!
//! Templates may contain `{{task}}`, `{{prd}}`, `{{progress}}`,
//! `{{requirements}}` and `{{workspace}}`. Every occurrence is replaced;
//! anything else that looks like a placeholder is left as written.

use serde::{Deserialize, Serialize};

/// A recognised template placeholder.
///
/// # Example
///
/// ```
/// use ralph_loop::prompt::templates::Placeholder;
///
/// assert_eq!(Placeholder::Task.tag(), "{{task}}");
/// assert_eq!(Placeholder::from_tag("{{prd}}"), Some(Placeholder::Prd));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placeholder {
    Task,
    Prd,
    Progress,
    Requirements,
    Workspace,
}

impl Placeholder {
    /// Tag string as it appears in templates.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Placeholder::Task => "{{task}}",
            Placeholder::Prd => "{{prd}}",
            Placeholder::Progress => "{{progress}}",
            Placeholder::Requirements => "{{requirements}}",
            Placeholder::Workspace => "{{workspace}}",
        }
    }

    /// All placeholders.
    #[must_use]
    pub fn all() -> &'static [Placeholder] {
        &[
            Placeholder::Task,
            Placeholder::Prd,
            Placeholder::Progress,
            Placeholder::Requirements,
            Placeholder::Workspace,
        ]
    }

    /// Parse a tag string into a placeholder.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Placeholder> {
        Self::all().iter().copied().find(|p| p.tag() == tag)
    }
}

impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVariables {
    pub task: String,
    pub prd: String,
    pub progress: String,
    pub requirements: String,
    pub workspace: String,
}

impl TemplateVariables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    #[must_use]
    pub fn with_prd(mut self, prd: impl Into<String>) -> Self {
        self.prd = prd.into();
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: impl Into<String>) -> Self {
        self.progress = progress.into();
        self
    }

    #[must_use]
    pub fn with_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.requirements = requirements.into();
        self
    }

    #[must_use]
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Value for a placeholder.
    #[must_use]
    pub fn value(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Task => &self.task,
            Placeholder::Prd => &self.prd,
            Placeholder::Progress => &self.progress,
            Placeholder::Requirements => &self.requirements,
            Placeholder::Workspace => &self.workspace,
        }
    }
}

/// Replace every known placeholder in `template`.
///
/// Substitution is a single left-to-right pass: text inside a substituted
/// value is copied as-is, so a task or PRD mentioning `{{progress}}` keeps
/// it literally.
#[must_use]
pub fn apply_template(template: &str, variables: &TemplateVariables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        let placeholder = candidate
            .find("}}")
            .and_then(|close| Placeholder::from_tag(&candidate[..close + 2]));
        match placeholder {
            Some(placeholder) => {
                out.push_str(variables.value(placeholder));
                rest = &candidate[placeholder.tag().len()..];
            }
            None => {
                out.push_str("{{");
                rest = &candidate[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_set() -> TemplateVariables {
        TemplateVariables::new()
            .with_task("Task")
            .with_prd("PRD")
            .with_progress("Progress")
            .with_requirements("Requirements")
            .with_workspace("/workspace")
    }

    #[test]
    fn test_each_placeholder() {
        let vars = all_set();
        assert_eq!(apply_template("Task: {{task}}", &vars), "Task: Task");
        assert_eq!(apply_template("PRD: {{prd}}", &vars), "PRD: PRD");
        assert_eq!(apply_template("P: {{progress}}", &vars), "P: Progress");
        assert_eq!(apply_template("R: {{requirements}}", &vars), "R: Requirements");
        assert_eq!(apply_template("W: {{workspace}}", &vars), "W: /workspace");
    }

    #[test]
    fn test_repeated_placeholder() {
        let vars = TemplateVariables::new().with_task("Test");
        assert_eq!(
            apply_template("{{task}} - {{task}} - {{task}}", &vars),
            "Test - Test - Test"
        );
    }

    #[test]
    fn test_unknown_placeholders_left_alone() {
        let vars = all_set();
        assert_eq!(
            apply_template("{{task}} {{unknown}} {{TASK}}", &vars),
            "Task {{unknown}} {{TASK}}"
        );
    }

    #[test]
    fn test_substituted_values_are_not_expanded() {
        let vars = TemplateVariables::new()
            .with_task("Document the {{progress}} tag")
            .with_prd("see {{workspace}}")
            .with_progress("SECRET-PROGRESS")
            .with_workspace("/work");
        assert_eq!(
            apply_template("{{task}} | {{prd}} | {{workspace}}", &vars),
            "Document the {{progress}} tag | see {{workspace}} | /work"
        );
    }

    #[test]
    fn test_unterminated_and_nested_braces() {
        let vars = all_set();
        assert_eq!(apply_template("{{{{task}}", &vars), "{{Task");
        assert_eq!(apply_template("tail {{task", &vars), "tail {{task");
        assert_eq!(apply_template("{{}} {{task}}", &vars), "{{}} Task");
    }

    #[test]
    fn test_plain_template_unchanged() {
        let template = "This is a plain template with no placeholders";
        assert_eq!(apply_template(template, &all_set()), template);
    }

    #[test]
    fn test_empty_values() {
        let vars = TemplateVariables::new();
        assert_eq!(
            apply_template("Task: {{task}}, PRD: {{prd}}", &vars),
            "Task: , PRD: "
        );
    }

    #[test]
    fn test_multiline_template() {
        let template = "Task: {{task}}\n\nPRD:\n{{prd}}\n\nSteps:\n{{requirements}}\nIn: {{workspace}}";
        let vars = TemplateVariables::new()
            .with_task("Add login feature")
            .with_prd("# Login PRD\n- [ ] Add auth")
            .with_requirements("1. Implement\n2. Test")
            .with_workspace("/my/project");
        let result = apply_template(template, &vars);
        assert!(result.contains("Task: Add login feature"));
        assert!(result.contains("# Login PRD"));
        assert!(result.contains("1. Implement"));
        assert!(result.contains("In: /my/project"));
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(Placeholder::from_tag("{{workspace}}"), Some(Placeholder::Workspace));
        assert_eq!(Placeholder::from_tag("{{nope}}"), None);
        assert_eq!(Placeholder::Progress.to_string(), "{{progress}}");
    }
}
