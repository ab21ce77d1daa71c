//! Size limits for tool results handed back to the model.
//!
//! Clipping only affects what the model reads. The dispatcher emits the
//! untouched text with the `ToolCallEnd` event, and command output has
//! already been mirrored live, so each notice says what was dropped and
//! where the rest can be found.

use crate::AgentConfig;
use crate::tools::{READ_FILE_TOOL, RUN_COMMAND_TOOL, ToolResult};

pub const DEFAULT_OUTPUT_LIMIT: usize = 20_000;

/// Which part of an oversized text survives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keep {
    /// The beginning: status lines, diffs and file listings lead with what matters.
    Start,
    /// Both ends: command output tends to end with the failure.
    Ends,
}

/// The `ToolResult` field being clipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Result,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputBudget {
    pub max_chars: usize,
    pub max_lines: Option<usize>,
    pub keep: Keep,
}

impl OutputBudget {
    pub fn for_tool(tool: &str, config: &AgentConfig) -> Self {
        Self {
            max_chars: config
                .tool_output_limits
                .get(tool)
                .copied()
                .unwrap_or(DEFAULT_OUTPUT_LIMIT),
            max_lines: config.tool_line_limits.get(tool).copied(),
            keep: if tool == RUN_COMMAND_TOOL {
                Keep::Ends
            } else {
                Keep::Start
            },
        }
    }

    /// Splits the budget between stdout and stderr of one command.
    fn halved(self) -> Self {
        Self {
            max_chars: (self.max_chars / 2).max(1),
            max_lines: self.max_lines.map(|lines| (lines / 2).max(1)),
            keep: self.keep,
        }
    }

    pub fn apply(&self, text: &str, tool: &str, channel: Channel) -> String {
        let clipped = clip_chars(text, self.max_chars, self.keep, tool, channel);
        match self.max_lines {
            Some(max_lines) => clip_lines(&clipped, max_lines, self.keep, tool, channel),
            None => clipped,
        }
    }
}

/// Clips both fields of `result`. When a command produced stdout and stderr,
/// each gets half of the tool's budget.
pub fn truncate_tool_result(result: &mut ToolResult, tool: &str, config: &AgentConfig) {
    let mut budget = OutputBudget::for_tool(tool, config);
    let has_error_text = result.error.as_deref().is_some_and(|error| !error.is_empty());
    if tool == RUN_COMMAND_TOOL && has_error_text && !result.result.is_empty() {
        budget = budget.halved();
    }

    result.result = budget.apply(&result.result, tool, Channel::Result);
    if let Some(error) = result.error.take() {
        result.error = Some(budget.apply(&error, tool, Channel::Error));
    }
}

fn notice(tool: &str, channel: Channel, count: usize, unit: &str) -> String {
    let what = match (tool, channel) {
        (RUN_COMMAND_TOOL, Channel::Result) => "stdout",
        (RUN_COMMAND_TOOL, Channel::Error) => "stderr",
        (_, Channel::Result) => "output",
        (_, Channel::Error) => "error text",
    };
    let rest = match tool {
        RUN_COMMAND_TOOL => "it was shown live while the command ran",
        READ_FILE_TOOL => "read again with offset and limit to see it",
        _ => "the full text was sent with the tool_call_end event",
    };
    format!("[... {count} {unit} of {what} omitted; {rest} ...]")
}

fn clip_chars(text: &str, max_chars: usize, keep: Keep, tool: &str, channel: Channel) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let omitted = notice(tool, channel, total - max_chars, "characters");
    match keep {
        Keep::Start => format!("{}\n{omitted}", prefix_chars(text, max_chars)),
        Keep::Ends => {
            let head = max_chars / 2;
            let tail = max_chars - head;
            format!(
                "{}\n{omitted}\n{}",
                prefix_chars(text, head),
                suffix_chars(text, total, tail)
            )
        }
    }
}

fn clip_lines(text: &str, max_lines: usize, keep: Keep, tool: &str, channel: Channel) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    let omitted = notice(tool, channel, lines.len() - max_lines, "lines");
    match keep {
        Keep::Start => format!("{}\n{omitted}", lines[..max_lines].join("\n")),
        Keep::Ends => {
            let head = max_lines / 2;
            let tail = max_lines - head;
            format!(
                "{}\n{omitted}\n{}",
                lines[..head].join("\n"),
                lines[lines.len() - tail..].join("\n")
            )
        }
    }
}

fn prefix_chars(text: &str, count: usize) -> &str {
    let end = text
        .char_indices()
        .nth(count)
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

fn suffix_chars(text: &str, total: usize, count: usize) -> &str {
    let start = text
        .char_indices()
        .nth(total.saturating_sub(count))
        .map_or(text.len(), |(idx, _)| idx);
    &text[start..]
}
