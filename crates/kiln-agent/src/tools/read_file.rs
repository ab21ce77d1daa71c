use serde_json::json;
use std::sync::Arc;

use crate::ToolError;

use super::{
    READ_FILE_TOOL, RegisteredTool, ToolDefinition, ToolResult, format_line_numbered_content,
    optional_usize_parameter, required_parameter,
};

pub(super) fn read_file_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition {
            name: READ_FILE_TOOL.to_string(),
            description: "Read a file. Returns line-numbered content; offset is the 1-based \
                          first line and limit the number of lines."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": { "type": "string" },
                    "offset": { "type": "integer" },
                    "limit": { "type": "integer" }
                }
            }),
            body: None,
        },
        executor: Arc::new(|invocation, context| {
            Box::pin(async move {
                let path = required_parameter(&invocation, "path")?;
                let offset = optional_usize_parameter(&invocation, "offset")?
                    .unwrap_or(1)
                    .max(1);
                let limit = optional_usize_parameter(&invocation, "limit")?;

                let content = context.edits.environment().read_file(path).await?;
                let total_lines = content.lines().count();
                if offset > 1 && offset > total_lines {
                    return Err(ToolError::Validation(format!(
                        "offset {} is past the end of '{}' ({} lines)",
                        offset, path, total_lines
                    ))
                    .into());
                }

                let selected: Vec<&str> = content
                    .lines()
                    .skip(offset - 1)
                    .take(limit.unwrap_or(usize::MAX))
                    .collect();
                Ok(ToolResult::success(
                    READ_FILE_TOOL,
                    format_line_numbered_content(&selected.join("\n"), offset),
                ))
            })
        }),
    }
}
