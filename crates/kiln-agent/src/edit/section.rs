use crate::ToolError;

const PREVIEW_LINES: usize = 10;
const PREVIEW_LINE_CHARS: usize = 120;

/// Replaces the single occurrence of `old_text` in `content` with `new_text`.
///
/// The match is textual and must be unique: zero or multiple occurrences are
/// rejected rather than guessed. When the file uses CRLF line endings and
/// `old_text` does not, both snippets are translated to CRLF first.
pub(crate) fn replace_unique(
    content: &str,
    file_path: &str,
    old_text: &str,
    new_text: &str,
) -> Result<String, ToolError> {
    if old_text.is_empty() {
        return Err(ToolError::Validation(
            "old_text must not be empty; quote the exact text to replace".to_string(),
        ));
    }

    let (old_text, new_text) = match_line_endings(content, old_text, new_text);
    match content.match_indices(old_text.as_str()).count() {
        0 => Err(ToolError::Validation(format!(
            "old_text was not found in '{}'. Copy the text exactly as it appears in the file, \
             including whitespace. The file begins with:\n{}",
            file_path,
            head_preview(content)
        ))),
        1 => Ok(content.replacen(old_text.as_str(), &new_text, 1)),
        count => Err(ToolError::Validation(format!(
            "old_text matches {} locations in '{}'; provide more surrounding context so it \
             matches exactly once",
            count, file_path
        ))),
    }
}

fn match_line_endings(content: &str, old_text: &str, new_text: &str) -> (String, String) {
    if content.contains("\r\n") && !old_text.contains("\r\n") && old_text.contains('\n') {
        return (
            old_text.replace('\n', "\r\n"),
            new_text.replace("\r\n", "\n").replace('\n', "\r\n"),
        );
    }
    (old_text.to_string(), new_text.to_string())
}

fn head_preview(content: &str) -> String {
    if content.is_empty() {
        return "(file is empty)".to_string();
    }
    let mut preview: Vec<String> = content
        .lines()
        .take(PREVIEW_LINES)
        .enumerate()
        .map(|(idx, line)| {
            let clipped: String = line.chars().take(PREVIEW_LINE_CHARS).collect();
            format!("{} | {}", idx + 1, clipped)
        })
        .collect();
    let total = content.lines().count();
    if total > PREVIEW_LINES {
        preview.push(format!("... ({} more lines)", total - PREVIEW_LINES));
    }
    preview.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_match_is_replaced() {
        let updated = replace_unique("let a = 1;\nlet b = 2;\n", "f.rs", "let b = 2;", "let b = 3;")
            .expect("unique match should succeed");
        assert_eq!(updated, "let a = 1;\nlet b = 3;\n");
    }

    #[test]
    fn duplicate_match_reports_count() {
        let error = replace_unique("x\nx\n", "f.rs", "x", "y").expect_err("ambiguous");
        let message = error.to_string();
        assert!(message.contains("matches 2 locations"));
        assert!(message.contains("more surrounding context"));
    }

    #[test]
    fn missing_match_shows_file_head() {
        let content: String = (1..=15).map(|n| format!("row {n}\n")).collect();
        let error = replace_unique(&content, "f.txt", "absent", "y").expect_err("missing");
        let message = error.to_string();
        assert!(message.contains("not found in 'f.txt'"));
        assert!(message.contains("1 | row 1"));
        assert!(message.contains("10 | row 10"));
        assert!(!message.contains("11 | row 11"));
        assert!(message.contains("(5 more lines)"));
    }

    #[test]
    fn empty_old_text_is_rejected() {
        assert!(replace_unique("abc", "f", "", "x").is_err());
    }

    #[test]
    fn crlf_files_match_lf_snippets() {
        let updated = replace_unique("a\r\nb\r\nc\r\n", "f", "a\nb", "a\nB")
            .expect("crlf translation should match");
        assert_eq!(updated, "a\r\nB\r\nc\r\n");
    }
}
