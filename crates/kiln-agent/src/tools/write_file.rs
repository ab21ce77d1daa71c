use serde_json::json;
use std::sync::Arc;

use super::{
    RegisteredTool, ToolDefinition, WRITE_FILE_TOOL, finish_edit, required_parameter,
    restore_trailing_newline,
};

pub(super) fn write_file_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition {
            name: WRITE_FILE_TOOL.to_string(),
            description: "Write the complete content of a file, creating it and its parent \
                          directories if needed. Never abbreviate unchanged code."
                .to_string(),
            parameters: json!({
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": { "type": "string" },
                    "description": { "type": "string" }
                }
            }),
            body: Some("the full new file content".to_string()),
        },
        executor: Arc::new(|invocation, context| {
            Box::pin(async move {
                let path = required_parameter(&invocation, "path")?;
                let description = invocation.parameter("description").unwrap_or_default();
                let content = restore_trailing_newline(&invocation.body);

                let edit = context
                    .edits
                    .propose_edit(path, &content, description)
                    .await?;
                Ok(finish_edit(&edit, &context).await)
            })
        }),
    }
}
