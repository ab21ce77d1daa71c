use crate::events::SessionEvent;
use crate::protocol::ToolInvocation;
use crate::truncation::truncate_tool_result;
use crate::{AgentError, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::{ToolContext, ToolResult};

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolResult, AgentError>> + Send>>;
pub type ToolExecutor = Arc<dyn Fn(ToolInvocation, ToolContext) -> ToolFuture + Send + Sync>;

/// Describes a tool to the model. `parameters` is a JSON schema over the tag
/// attributes; `body` documents what the tag body carries, if anything.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub executor: ToolExecutor,
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn register(&mut self, tool: RegisteredTool) {
        self.tools.insert(tool.definition.name.clone(), tool);
    }

    pub fn unregister(&mut self, name: &str) -> Option<RegisteredTool> {
        self.tools.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| tool.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Runs `invocations` one after another, in order. Every invocation
    /// produces exactly one result; failures never escape as `Err`.
    pub async fn dispatch(
        &self,
        invocations: Vec<ToolInvocation>,
        context: &ToolContext,
    ) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(invocations.len());
        for (index, invocation) in invocations.into_iter().enumerate() {
            results.push(self.dispatch_single(index, invocation, context).await);
        }
        results
    }

    async fn dispatch_single(
        &self,
        index: usize,
        invocation: ToolInvocation,
        context: &ToolContext,
    ) -> ToolResult {
        let start_time = Instant::now();
        let tool_name = invocation.name.clone();
        debug!(tool = %tool_name, index, "dispatching tool invocation");
        emit(
            context,
            SessionEvent::tool_call_start(context.session_id.clone(), tool_name.clone(), index),
        );

        let mut result = match self.get(&tool_name) {
            None => ToolResult::failure(
                tool_name.clone(),
                AgentError::UnknownTool(tool_name.clone()).to_string(),
            ),
            Some(registered) => {
                match validate_parameters(&registered.definition.parameters, &invocation) {
                    Err(error) => ToolResult::failure(tool_name.clone(), error.to_string()),
                    Ok(()) => match (registered.executor)(invocation, context.clone()).await {
                        Ok(result) => result,
                        Err(error) => ToolResult::failure(tool_name.clone(), error.to_string()),
                    },
                }
            }
        };
        result.tool = tool_name.clone();

        emit(
            context,
            SessionEvent::tool_call_end(
                context.session_id.clone(),
                tool_name.clone(),
                Some(result.result.clone()).filter(|output| !output.is_empty()),
                result.error.clone(),
                start_time.elapsed().as_millis(),
            ),
        );

        truncate_tool_result(&mut result, &tool_name, &context.config);
        result
    }
}

fn emit(context: &ToolContext, event: SessionEvent) {
    if let Err(error) = context.emitter.emit(event) {
        debug!(error = %error, "event emitter rejected event");
    }
}

/// Checks required attributes and integer-typed attributes against the
/// tool's schema. Attributes the schema does not mention pass through.
fn validate_parameters(schema: &Value, invocation: &ToolInvocation) -> Result<(), ToolError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if invocation.parameter(key).is_none() {
                return Err(ToolError::Validation(format!(
                    "missing required parameter '{}' for tool '{}'",
                    key, invocation.name
                )));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in &invocation.parameters {
        let Some(type_name) = properties
            .get(key)
            .and_then(|property| property.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let is_valid = match type_name {
            "integer" => value.trim().parse::<u64>().is_ok(),
            "boolean" => matches!(value.trim(), "true" | "false"),
            _ => true,
        };
        if !is_valid {
            return Err(ToolError::Validation(format!(
                "parameter '{}' expected type '{}' but received '{}'",
                key, type_name, value
            )));
        }
    }
    Ok(())
}
