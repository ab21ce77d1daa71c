//! Recovers tool invocations from free-form model output.
//!
//! Recognized forms:
//!
//! ```text
//! <tool name="write_file" path="src/lib.rs">BODY</tool>
//! <tool name="read_file" path="src/lib.rs"/>
//! ```
//!
//! Anything that does not parse is skipped; parsing never fails.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::tools::WRITE_FILE_TOOL;

const OPEN_MARKER: &str = "<tool";
const CLOSE_TAG: &str = "</tool>";

/// Tools whose body carries file content; an empty body there almost always
/// means the generation was cut off.
const CONTENT_TOOLS: &[&str] = &[WRITE_FILE_TOOL];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
    pub body: String,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub invocations: Vec<ToolInvocation>,
    /// Fragments that looked like a tool tag but could not be parsed.
    pub skipped: usize,
}

/// Returns every well-formed invocation in `text`, in source order.
pub fn parse_tool_calls(text: &str) -> Vec<ToolInvocation> {
    parse_tool_calls_with_report(text).invocations
}

pub fn parse_tool_calls_with_report(text: &str) -> ParseReport {
    let mut report = ParseReport::default();
    let mut cursor = 0usize;

    while let Some(offset) = text[cursor..].find(OPEN_MARKER) {
        let start = cursor + offset;
        match parse_fragment(text, start) {
            Some((invocation, end)) => {
                warn_on_empty_content(&invocation);
                report.invocations.push(invocation);
                cursor = end;
            }
            None => {
                if is_tag_boundary(text, start) {
                    debug!(offset = start, "skipping malformed tool tag");
                    report.skipped += 1;
                }
                cursor = start + OPEN_MARKER.len();
            }
        }
    }

    report
}

/// Parses one tag starting at `start`, returning the invocation and the byte
/// offset just past it.
fn parse_fragment(text: &str, start: usize) -> Option<(ToolInvocation, usize)> {
    let captures = open_tag_regex().captures(&text[start..])?;
    let whole = captures.get(0)?;
    let attributes = parse_attributes(captures.name("attrs")?.as_str())?;
    let self_closing = captures.name("close")?.as_str() == "/>";
    let open_end = start + whole.end();

    let (raw_body, end) = if self_closing {
        ("", open_end)
    } else {
        let close_offset = text[open_end..].find(CLOSE_TAG)?;
        let body_end = open_end + close_offset;
        (&text[open_end..body_end], body_end + CLOSE_TAG.len())
    };

    let mut parameters = attributes;
    let name = parameters.remove("name")?;
    if name.trim().is_empty() {
        return None;
    }

    Some((
        ToolInvocation {
            name,
            parameters,
            body: raw_body.trim().to_string(),
        },
        end,
    ))
}

fn parse_attributes(raw: &str) -> Option<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    let mut consumed = 0usize;
    for captures in attribute_regex().captures_iter(raw) {
        let whole = captures.get(0)?;
        // Everything between attributes must be whitespace.
        if !raw[consumed..whole.start()].trim().is_empty() {
            return None;
        }
        consumed = whole.end();
        attributes
            .entry(captures["key"].to_string())
            .or_insert_with(|| captures["value"].to_string());
    }
    if !raw[consumed..].trim().is_empty() {
        return None;
    }
    Some(attributes)
}

fn is_tag_boundary(text: &str, start: usize) -> bool {
    text[start + OPEN_MARKER.len()..]
        .chars()
        .next()
        .is_none_or(|ch| ch.is_whitespace() || ch == '>' || ch == '/')
}

fn warn_on_empty_content(invocation: &ToolInvocation) {
    if CONTENT_TOOLS.contains(&invocation.name.as_str()) && invocation.body.is_empty() {
        warn!(
            tool = %invocation.name,
            path = invocation.parameter("path").unwrap_or_default(),
            "tool invocation has an empty body; the response may have been truncated"
        );
    }
}

fn open_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"^<tool(?P<attrs>(?:\s+[^\s=/>"]+\s*=\s*"[^"]*")*)\s*(?P<close>/>|>)"#)
            .expect("tool tag regex should compile")
    })
}

fn attribute_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?P<key>[^\s=/>"]+)\s*=\s*"(?P<value>[^"]*)""#)
            .expect("attribute regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_tags_yields_nothing() {
        assert!(parse_tool_calls("").is_empty());
        assert!(parse_tool_calls("I will now think about the problem.").is_empty());
        assert!(parse_tool_calls("a < b and tooling > c").is_empty());
    }

    #[test]
    fn paired_tag_carries_parameters_and_trimmed_body() {
        let text = r#"Sure.
<tool name="write_file" path="src/main.rs" description="entry point">
fn main() {}
</tool>"#;
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "write_file");
        assert_eq!(calls[0].parameter("path"), Some("src/main.rs"));
        assert_eq!(calls[0].parameter("description"), Some("entry point"));
        assert_eq!(calls[0].parameter("name"), None);
        assert_eq!(calls[0].body, "fn main() {}");
    }

    #[test]
    fn self_closing_tag_has_empty_body() {
        let calls = parse_tool_calls(r#"<tool name="read_file" path="Cargo.toml" />"#);
        assert_eq!(
            calls,
            vec![ToolInvocation::new("read_file").with_parameter("path", "Cargo.toml")]
        );
    }

    #[test]
    fn mixed_forms_keep_source_order() {
        let text = r#"
first <tool name="read_file" path="a.txt"/>
then <tool name="run_command" timeout_ms="500">cargo test</tool>
and <tool name="update_plan">- [x] done</tool>
"#;
        let names: Vec<String> = parse_tool_calls(text)
            .into_iter()
            .map(|call| call.name)
            .collect();
        assert_eq!(names, vec!["read_file", "run_command", "update_plan"]);
    }

    #[test]
    fn unknown_attributes_are_preserved_verbatim() {
        let calls = parse_tool_calls(r#"<tool name="x" weird-key="a > b" empty=""/>"#);
        assert_eq!(calls[0].parameter("weird-key"), Some("a > b"));
        assert_eq!(calls[0].parameter("empty"), Some(""));
    }

    #[test]
    fn unterminated_tag_is_skipped_without_losing_earlier_calls() {
        let text = r#"<tool name="read_file" path="a"/> <tool name="write_file" path="b">partial"#;
        let report = parse_tool_calls_with_report(text);
        assert_eq!(report.invocations.len(), 1);
        assert_eq!(report.invocations[0].name, "read_file");
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn malformed_tags_are_skipped_and_parsing_resumes() {
        let text = r#"
<tool path="missing-name"/>
<tool name=unquoted/>
<tool name="read_file" path="ok.txt"/>
"#;
        let report = parse_tool_calls_with_report(text);
        assert_eq!(report.invocations.len(), 1);
        assert_eq!(report.invocations[0].parameter("path"), Some("ok.txt"));
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn tooling_word_is_not_counted_as_skipped_fragment() {
        let report = parse_tool_calls_with_report("<toolbox> is not a tag");
        assert!(report.invocations.is_empty());
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn empty_write_body_still_parses() {
        let calls = parse_tool_calls(r#"<tool name="write_file" path="a.rs">   </tool>"#);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].body.is_empty());
    }

    #[test]
    fn n_well_formed_tags_yield_n_invocations() {
        let text: String = (0..5)
            .map(|idx| format!("step {idx}: <tool name=\"t{idx}\">body {idx}</tool>\n"))
            .collect();
        let calls = parse_tool_calls(&text);
        assert_eq!(calls.len(), 5);
        for (idx, call) in calls.iter().enumerate() {
            assert_eq!(call.name, format!("t{idx}"));
            assert_eq!(call.body, format!("body {idx}"));
        }
    }

    #[test]
    fn arbitrary_input_never_panics() {
        for input in [
            "<tool",
            "<tool name=\"",
            "<tool name=\"a\"",
            "<tool name=\"a\">",
            "</tool>",
            "<tool name=\"é\">ünïcode</tool>",
            "<<tool name=\"a\"/>>",
        ] {
            let _ = parse_tool_calls(input);
        }
        assert_eq!(parse_tool_calls("<<tool name=\"a\"/>>").len(), 1);
    }
}
