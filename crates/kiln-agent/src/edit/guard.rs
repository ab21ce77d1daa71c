use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

use crate::ToolError;

/// Phrases a model writes when it summarizes code instead of reproducing it.
/// Writing any of them to disk would silently drop the elided content.
const ELISION_PATTERNS: &[(&str, &str)] = &[
    ("rest of file", r"\brest of (the )?(file|code)\b"),
    ("remaining code", r"\bremaining (code|content)\b"),
    (
        "... existing code",
        r"(\.\.\.|…)\s*(existing|previous|unchanged|other|rest of( the)?|remaining)\s+(code|content|implementation|logic|methods|functions|lines|imports|fields|tests)\b",
    ),
    (
        "existing code here",
        r"\b(existing|unchanged|previous) code (here|remains|goes here|omitted|unchanged)\b",
    ),
    ("omitted for brevity", r"\b(omitted|truncated|elided) for brevity\b"),
    (
        "TODO referencing omitted content",
        r"\bTODO:?\s*(add|implement|include|insert|fill in)?\s*(the )?(rest|remaining|remainder)\b",
    ),
];

fn compiled_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        ELISION_PATTERNS
            .iter()
            .map(|(label, pattern)| {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("elision pattern should compile");
                (*label, regex)
            })
            .collect()
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElisionMatch {
    pub label: &'static str,
    pub line: usize,
    pub text: String,
}

/// Returns the first elision placeholder found in `content`, if any.
pub fn find_elision(content: &str) -> Option<ElisionMatch> {
    for (line_idx, line) in content.lines().enumerate() {
        for (label, regex) in compiled_patterns() {
            if regex.is_match(line) {
                return Some(ElisionMatch {
                    label: *label,
                    line: line_idx + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }
    None
}

pub(crate) fn reject_elision(path: &str, content: &str) -> Result<(), ToolError> {
    let Some(found) = find_elision(content) else {
        return Ok(());
    };
    Err(ToolError::Validation(format!(
        "proposed content for '{}' contains a placeholder ({}) at line {}: `{}`. \
         Provide the complete content instead of summarizing unchanged code.",
        path, found.label, found.line, found.text
    )))
}

pub(crate) fn reject_empty_overwrite(
    path: &str,
    existing: &str,
    new_content: &str,
) -> Result<(), ToolError> {
    if existing.is_empty() || !new_content.trim().is_empty() {
        return Ok(());
    }
    Err(ToolError::Validation(format!(
        "refusing to replace the non-empty file '{}' ({} bytes) with empty content. \
         Use delete_file to remove a file, or provide the full new content.",
        path,
        existing.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_placeholders() {
        for (content, label) in [
            ("fn a() {}\n// rest of file unchanged\n", "rest of file"),
            ("# remaining code stays the same", "remaining code"),
            ("    // ... existing code ...", "... existing code"),
            ("/* existing code here */", "existing code here"),
            ("// helpers omitted for brevity", "omitted for brevity"),
            ("// TODO: implement the rest", "TODO referencing omitted content"),
            ("// TODO add remaining handlers", "TODO referencing omitted content"),
        ] {
            let found = find_elision(content).expect("placeholder should be detected");
            assert_eq!(found.label, label, "{content:?}");
        }
    }

    #[test]
    fn reports_line_number_of_placeholder() {
        let found = find_elision("a\nb\n// Rest Of The Code\n").expect("should match");
        assert_eq!(found.line, 3);
        assert_eq!(found.text, "// Rest Of The Code");
    }

    #[test]
    fn ordinary_code_passes() {
        let content = "fn rest() {}\nlet remaining = items.len();\n// TODO: handle errors\n";
        assert_eq!(find_elision(content), None);
        assert!(reject_elision("a.rs", content).is_ok());
    }

    #[test]
    fn spread_syntax_is_not_a_placeholder() {
        let content = "const next = { ...existing, done: true };\n\
                       const queue = [...remaining, last];\n\
                       setItems([...previous, item]);\n\
                       call(...other);\n";
        assert_eq!(find_elision(content), None);
        assert!(reject_elision("state.ts", content).is_ok());

        let found = find_elision("  // ...remaining methods\n").expect("should match");
        assert_eq!(found.label, "... existing code");
    }

    #[test]
    fn empty_overwrite_only_rejected_for_non_empty_files() {
        assert!(reject_empty_overwrite("a.txt", "", "").is_ok());
        assert!(reject_empty_overwrite("a.txt", "data", "new").is_ok());

        let error = reject_empty_overwrite("a.txt", "data", "  \n\t")
            .expect_err("whitespace should not overwrite data");
        assert!(error.to_string().contains("delete_file"));
    }
}
