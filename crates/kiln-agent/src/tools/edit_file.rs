use serde_json::json;
use std::sync::Arc;

use crate::ToolError;
use crate::protocol::ToolInvocation;

use super::{EDIT_FILE_TOOL, RegisteredTool, ToolDefinition, finish_edit, required_parameter};

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const DIVIDER_MARKER: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchReplaceBlock {
    pub search: String,
    pub replace: String,
}

enum BlockState {
    Outside,
    Search,
    Replace,
}

/// Parses `<<<<<<< SEARCH` / `=======` / `>>>>>>> REPLACE` blocks.
///
/// Marker lines must appear on their own (surrounding whitespace is
/// ignored). Text outside of blocks is ignored.
pub fn parse_search_replace_blocks(body: &str) -> Result<Vec<SearchReplaceBlock>, ToolError> {
    let mut blocks = Vec::new();
    let mut state = BlockState::Outside;
    let mut search: Vec<&str> = Vec::new();
    let mut replace: Vec<&str> = Vec::new();

    for (idx, line) in body.lines().enumerate() {
        let marker = line.trim();
        match state {
            BlockState::Outside => {
                if marker == SEARCH_MARKER {
                    state = BlockState::Search;
                }
            }
            BlockState::Search => {
                if marker == DIVIDER_MARKER {
                    state = BlockState::Replace;
                } else if marker == SEARCH_MARKER || marker == REPLACE_MARKER {
                    return Err(ToolError::Validation(format!(
                        "unexpected '{}' on line {} before '{}'",
                        marker,
                        idx + 1,
                        DIVIDER_MARKER
                    )));
                } else {
                    search.push(line);
                }
            }
            BlockState::Replace => {
                if marker == REPLACE_MARKER {
                    blocks.push(SearchReplaceBlock {
                        search: search.join("\n"),
                        replace: replace.join("\n"),
                    });
                    search.clear();
                    replace.clear();
                    state = BlockState::Outside;
                } else if marker == SEARCH_MARKER {
                    return Err(ToolError::Validation(format!(
                        "unexpected '{}' on line {} before '{}'",
                        marker,
                        idx + 1,
                        REPLACE_MARKER
                    )));
                } else {
                    replace.push(line);
                }
            }
        }
    }

    if !matches!(state, BlockState::Outside) {
        return Err(ToolError::Validation(format!(
            "unterminated edit block; every '{}' needs a matching '{}'",
            SEARCH_MARKER, REPLACE_MARKER
        )));
    }
    Ok(blocks)
}

fn section_edits(invocation: &ToolInvocation) -> Result<Vec<SearchReplaceBlock>, ToolError> {
    if let Some(old_text) = invocation.parameter("old_text") {
        return Ok(vec![SearchReplaceBlock {
            search: old_text.to_string(),
            replace: invocation.parameter("new_text").unwrap_or_default().to_string(),
        }]);
    }

    let blocks = parse_search_replace_blocks(&invocation.body)?;
    if blocks.is_empty() {
        return Err(ToolError::Validation(format!(
            "edit_file needs old_text/new_text parameters or at least one '{}' block in the body",
            SEARCH_MARKER
        )));
    }
    Ok(blocks)
}

pub(super) fn edit_file_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition {
            name: EDIT_FILE_TOOL.to_string(),
            description: "Replace a section of a file. Each search text must match the file \
                          exactly once."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": { "type": "string" },
                    "old_text": { "type": "string" },
                    "new_text": { "type": "string" },
                    "description": { "type": "string" }
                }
            }),
            body: Some(format!(
                "one or more {SEARCH_MARKER} / {DIVIDER_MARKER} / {REPLACE_MARKER} blocks"
            )),
        },
        executor: Arc::new(|invocation, context| {
            Box::pin(async move {
                let path = required_parameter(&invocation, "path")?;
                let description = invocation.parameter("description").unwrap_or_default();
                let blocks = section_edits(&invocation)?;
                let replacements: Vec<(&str, &str)> = blocks
                    .iter()
                    .map(|block| (block.search.as_str(), block.replace.as_str()))
                    .collect();

                let edit = context
                    .edits
                    .edit_sections(path, &replacements, description)
                    .await?;
                Ok(finish_edit(&edit, &context).await)
            })
        }),
    }
}
