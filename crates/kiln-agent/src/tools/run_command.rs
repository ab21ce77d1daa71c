use serde_json::json;
use std::sync::Arc;

use crate::ToolError;
use crate::resolve_path;

use super::{RUN_COMMAND_TOOL, RegisteredTool, ToolDefinition, optional_u64_parameter};

pub(super) fn run_command_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition {
            name: RUN_COMMAND_TOOL.to_string(),
            description: "Run a shell command and return its output. Commands that outlive \
                          timeout_ms are terminated."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" },
                    "timeout_ms": { "type": "integer" },
                    "cwd": { "type": "string" }
                }
            }),
            body: Some("the command, when the command attribute is absent".to_string()),
        },
        executor: Arc::new(|invocation, context| {
            Box::pin(async move {
                let command = invocation
                    .parameter("command")
                    .map(str::trim)
                    .filter(|command| !command.is_empty())
                    .unwrap_or(invocation.body.as_str());
                if command.trim().is_empty() {
                    return Err(ToolError::Validation(
                        "run_command needs a command attribute or a non-empty body".to_string(),
                    )
                    .into());
                }

                let timeout_ms = context
                    .config
                    .effective_timeout_ms(optional_u64_parameter(&invocation, "timeout_ms")?);
                let cwd = match invocation.parameter("cwd") {
                    Some(dir) => resolve_path(dir, &context.cwd),
                    None => context.cwd.clone(),
                };
                Ok(context.runner.run(command, &cwd, timeout_ms).await)
            })
        }),
    }
}
