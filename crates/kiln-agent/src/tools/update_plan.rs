use serde_json::json;
use std::sync::Arc;

use crate::plan::parse_plan_steps;

use super::{RegisteredTool, ToolDefinition, ToolResult, UPDATE_PLAN_TOOL};

pub(super) fn update_plan_tool() -> RegisteredTool {
    RegisteredTool {
        definition: ToolDefinition {
            name: UPDATE_PLAN_TOOL.to_string(),
            description: "Replace the working plan. One step per line: `- [ ]` pending, \
                          `- [~]` in progress, `- [x]` completed."
                .to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
            body: Some("the checklist".to_string()),
        },
        executor: Arc::new(|invocation, context| {
            Box::pin(async move {
                let steps = parse_plan_steps(&invocation.body)?;
                let snapshot = context.plan.replace(steps);
                let summary = format!(
                    "Plan updated ({}/{} completed)\n{}",
                    snapshot.completed(),
                    snapshot.steps.len(),
                    snapshot.render()
                );
                Ok(ToolResult::success(UPDATE_PLAN_TOOL, summary).with_plan(snapshot))
            })
        }),
    }
}
