use serde_json::json;
use std::sync::Arc;

use super::{DELETE_FILE_TOOL, RegisteredTool, ToolDefinition, ToolResult, required_parameter};

pub(super) fn delete_file_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition {
            name: DELETE_FILE_TOOL.to_string(),
            description: "Delete a file. This is the only way to remove a file's content."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": { "type": "string" }
                }
            }),
            body: None,
        },
        executor: Arc::new(|invocation, context| {
            Box::pin(async move {
                let path = required_parameter(&invocation, "path")?;
                if !context.config.apply_edits {
                    return Ok(ToolResult::success(
                        DELETE_FILE_TOOL,
                        format!("Dry run: {path} was not deleted"),
                    ));
                }
                Ok(context.edits.delete_file(path).await)
            })
        }),
    }
}
