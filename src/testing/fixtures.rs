//! Sample PRDs and PRD editing helpers.

/// Five tasks: two complete, one in progress, two pending.
pub const MIXED_PRD: &str = "# Todo App

## Tasks

- [x] Set up project structure
- [x] Create data model
- [~] Implement add todo functionality
- [ ] Implement delete functionality
- [ ] Implement mark as complete
";

/// Three pending tasks.
pub const PENDING_PRD: &str = "# Project

- [ ] First task
- [ ] Second task
- [ ] Third task
";

/// Mark the first pending task whose description is `description` complete.
///
/// Other lines are left byte-for-byte unchanged.
///
/// # Example
///
/// ```
/// use ralph_loop::testing::mark_task_complete;
///
/// let prd = "- [ ] a\n- [ ] b\n";
/// assert_eq!(mark_task_complete(prd, "b"), "- [ ] a\n- [x] b\n");
/// ```
#[must_use]
pub fn mark_task_complete(content: &str, description: &str) -> String {
    let mut done = false;
    content
        .split_inclusive('\n')
        .map(|line| {
            if done {
                return line.to_string();
            }
            for prefix in ["- [ ]", "* [ ]"] {
                if let Some(rest) = line.strip_prefix(prefix) {
                    if rest.trim() == description {
                        done = true;
                        return format!("{}[x]{}", &prefix[..2], rest);
                    }
                }
            }
            line.to_string()
        })
        .collect()
}

/// Mark the first pending task complete, whatever it is.
#[must_use]
pub fn mark_first_pending_complete(content: &str) -> String {
    let first = content.lines().find_map(|line| {
        ["- [ ]", "* [ ]"]
            .iter()
            .find_map(|prefix| line.strip_prefix(prefix))
            .map(str::trim)
    });
    match first {
        Some(description) => mark_task_complete(content, description),
        None => content.to_string(),
    }
}
