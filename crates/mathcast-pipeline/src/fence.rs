//! Markdown code-fence normalization for model output.

/// Remove surrounding markdown code fences from model output.
///
/// Handles a fully fenced reply (```` ```lang ... ``` ````) as well as a
/// reply with prose around a single fenced block, in which case the first
/// block's contents are returned. Text without fences is only trimmed.
/// Applying the function twice gives the same result as applying it once.
pub fn strip_code_fences(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the info string (language tag) on the opening line.
        let body = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => return rest.trim_matches('`').trim().to_string(),
        };
        let body = match body.rfind("```") {
            Some(idx) if body[idx..].trim() == "```" => &body[..idx],
            _ => body,
        };
        return body.trim().to_string();
    }

    // Prose around a fenced block: keep the first block.
    if let Some(open) = trimmed.find("\n```") {
        let after_open = &trimmed[open + 4..];
        if let Some(line_end) = after_open.find('\n') {
            let body = &after_open[line_end + 1..];
            if let Some(close) = body.find("```") {
                return body[..close].trim().to_string();
            }
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_trimmed_only() {
        assert_eq!(strip_code_fences("  x = 1\n"), "x = 1");
    }

    #[test]
    fn test_language_fence() {
        let text = "```python\nclass SolutionScene(Scene):\n    pass\n```";
        assert_eq!(
            strip_code_fences(text),
            "class SolutionScene(Scene):\n    pass"
        );
    }

    #[test]
    fn test_bare_fence_without_closing() {
        let text = "```\n<div id=\"animation-container\"></div>";
        assert_eq!(strip_code_fences(text), "<div id=\"animation-container\"></div>");
    }

    #[test]
    fn test_prose_around_block() {
        let text = "Here is the fixed code:\n```html\n<p>hi</p>\n```\nLet me know.";
        assert_eq!(strip_code_fences(text), "<p>hi</p>");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "```js\nconst a = 1;\n```",
            "plain",
            "Intro\n```\nbody\n```",
            "``````",
            "",
        ];
        for input in inputs {
            let once = strip_code_fences(input);
            assert_eq!(strip_code_fences(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_inner_backticks_preserved() {
        let text = "```python\ns = \"```\"\nprint(s)\n```";
        assert_eq!(strip_code_fences(text), "s = \"```\"\nprint(s)");
    }
}
