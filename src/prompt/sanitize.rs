//! Sanitization of free-text task descriptions.

/// Longest description, in characters, that is forwarded to the agent.
pub const MAX_TASK_DESCRIPTION_LENGTH: usize = 5000;

/// Clean user-supplied text before embedding it in an agent request.
///
/// Trims, truncates to [`MAX_TASK_DESCRIPTION_LENGTH`] characters, strips
/// ASCII control characters other than tab/newline/carriage return,
/// collapses runs of three or more newlines to two and escapes any
/// line-initial code fence so the text cannot close a surrounding fence.
///
/// # Example
///
/// ```
/// use ralph_loop::prompt::sanitize_task_description;
///
/// assert_eq!(sanitize_task_description("  a\n\n\n\nb  "), "a\n\nb");
/// assert_eq!(sanitize_task_description("```rust"), "\\`\\`\\`rust");
/// ```
#[must_use]
pub fn sanitize_task_description(input: &str) -> String {
    let truncated: String = input
        .trim()
        .chars()
        .take(MAX_TASK_DESCRIPTION_LENGTH)
        .filter(|c| !is_stripped_control(*c))
        .collect();
    escape_fences(&collapse_newlines(&truncated))
}

fn is_stripped_control(c: char) -> bool {
    matches!(
        c,
        '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}'
    )
}

fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run > 2 {
                continue;
            }
        } else {
            run = 0;
        }
        out.push(c);
    }
    out
}

fn escape_fences(text: &str) -> String {
    text.split('\n')
        .map(|line| match line.strip_prefix("```") {
            Some(rest) => format!("\\`\\`\\`{}", rest),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_blank() {
        assert_eq!(sanitize_task_description(""), "");
        assert_eq!(sanitize_task_description(" \n\t "), "");
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(sanitize_task_description("  hello world  "), "hello world");
    }

    #[test]
    fn test_strips_control_characters() {
        let result = sanitize_task_description("hello\u{0}world\u{1F}\u{7F}!");
        assert_eq!(result, "helloworld!");
    }

    #[test]
    fn test_keeps_normal_whitespace() {
        assert_eq!(sanitize_task_description("a\tb\r\nc"), "a\tb\r\nc");
    }

    #[test]
    fn test_collapses_newlines() {
        assert_eq!(sanitize_task_description("line1\n\n\n\nline2"), "line1\n\nline2");
        assert_eq!(sanitize_task_description("line1\n\nline2"), "line1\n\nline2");
        assert_eq!(sanitize_task_description("a\n\n\nb\n\n\n\n\nc"), "a\n\nb\n\nc");
    }

    #[test]
    fn test_escapes_code_fences() {
        let result = sanitize_task_description("```javascript\ncode\n```");
        assert_eq!(result, "\\`\\`\\`javascript\ncode\n\\`\\`\\`");
    }

    #[test]
    fn test_inline_backticks_untouched() {
        assert_eq!(sanitize_task_description("use ``` here"), "use ``` here");
    }

    #[test]
    fn test_truncates_long_input() {
        let result = sanitize_task_description(&"a".repeat(10_000));
        assert_eq!(result.chars().count(), MAX_TASK_DESCRIPTION_LENGTH);
    }

    #[test]
    fn test_truncates_by_characters() {
        let result = sanitize_task_description(&"é".repeat(6000));
        assert_eq!(result.chars().count(), MAX_TASK_DESCRIPTION_LENGTH);
    }
}
