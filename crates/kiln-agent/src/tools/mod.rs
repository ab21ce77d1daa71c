mod delete_file;
mod edit_file;
mod read_file;
mod registry;
mod run_command;
mod update_plan;
mod write_file;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::{ContextInvalidator, EventContextInvalidator, NoopContextInvalidator};
use crate::diff::{compute_hunks, diff_stat};
use crate::edit::{APPLY_EDIT_LABEL, EditPipeline, FileEdit};
use crate::events::{EventEmitter, NoopEventEmitter};
use crate::exec::{CommandRunner, ProcessSupervisor};
use crate::execution::LocalExecutionEnvironment;
use crate::plan::{PlanSnapshot, PlanStore};
use crate::protocol::ToolInvocation;
use crate::{AgentConfig, ToolError};

pub use edit_file::{SearchReplaceBlock, parse_search_replace_blocks};
pub use registry::{RegisteredTool, ToolDefinition, ToolExecutor, ToolFuture, ToolRegistry};

pub const READ_FILE_TOOL: &str = "read_file";
pub const WRITE_FILE_TOOL: &str = "write_file";
pub const EDIT_FILE_TOOL: &str = "edit_file";
pub const DELETE_FILE_TOOL: &str = "delete_file";
pub const RUN_COMMAND_TOOL: &str = "run_command";
pub const UPDATE_PLAN_TOOL: &str = "update_plan";

/// Outcome of one tool invocation, as reported back to the model loop.
///
/// `error` being set is what marks a failure; an empty `result` on its own
/// is still a success. Both can be present, e.g. partial stdout followed by
/// a failing exit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanSnapshot>,
}

impl ToolResult {
    pub fn success(tool: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            result: result.into(),
            ..Self::default()
        }
    }

    pub fn failure(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }

    pub fn with_plan(mut self, plan: PlanSnapshot) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a tool may touch while it runs.
#[derive(Clone)]
pub struct ToolContext {
    pub cwd: PathBuf,
    pub session_id: String,
    pub edits: EditPipeline,
    pub runner: Arc<dyn CommandRunner>,
    pub plan: PlanStore,
    pub config: AgentConfig,
    pub emitter: Arc<dyn EventEmitter>,
}

impl ToolContext {
    /// A context backed by the local filesystem and a real process
    /// supervisor rooted at `cwd`.
    pub fn local(
        cwd: impl Into<PathBuf>,
        config: AgentConfig,
        emitter: Arc<dyn EventEmitter>,
        invalidator: Arc<dyn ContextInvalidator>,
    ) -> Self {
        let cwd = cwd.into();
        let session_id = uuid::Uuid::new_v4().to_string();
        let invalidator: Arc<dyn ContextInvalidator> = Arc::new(EventContextInvalidator::new(
            emitter.clone(),
            session_id.clone(),
            invalidator,
        ));
        let edits = EditPipeline::new(Arc::new(LocalExecutionEnvironment::new(cwd.clone())))
            .with_invalidator(invalidator.clone());
        let runner = ProcessSupervisor::new(emitter.clone())
            .with_invalidator(invalidator)
            .with_session_id(session_id.clone())
            .with_kill_grace(config.kill_grace_ms);
        Self {
            cwd,
            session_id,
            edits,
            runner: Arc::new(runner),
            plan: PlanStore::default(),
            config,
            emitter,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_edits(mut self, edits: EditPipeline) -> Self {
        self.edits = edits;
        self
    }

    pub fn with_plan(mut self, plan: PlanStore) -> Self {
        self.plan = plan;
        self
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("cwd", &self.cwd)
            .field("session_id", &self.session_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A context with no side channels: no events, no invalidation.
pub fn quiet_context(cwd: impl Into<PathBuf>, config: AgentConfig) -> ToolContext {
    ToolContext::local(
        cwd,
        config,
        Arc::new(NoopEventEmitter),
        Arc::new(NoopContextInvalidator),
    )
}

pub fn build_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(read_file::read_file_tool());
    registry.register(write_file::write_file_tool());
    registry.register(edit_file::edit_file_tool());
    registry.register(delete_file::delete_file_tool());
    registry.register(run_command::run_command_tool());
    registry.register(update_plan::update_plan_tool());
    registry
}

fn required_parameter<'a>(invocation: &'a ToolInvocation, key: &str) -> Result<&'a str, ToolError> {
    invocation
        .parameter(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ToolError::Validation(format!("missing required parameter '{}'", key)))
}

fn optional_u64_parameter(invocation: &ToolInvocation, key: &str) -> Result<Option<u64>, ToolError> {
    let Some(raw) = invocation.parameter(key) else {
        return Ok(None);
    };
    raw.trim().parse::<u64>().map(Some).map_err(|_| {
        ToolError::Validation(format!(
            "parameter '{}' must be a non-negative integer, got '{}'",
            key, raw
        ))
    })
}

fn optional_usize_parameter(
    invocation: &ToolInvocation,
    key: &str,
) -> Result<Option<usize>, ToolError> {
    Ok(optional_u64_parameter(invocation, key)?.map(|value| value as usize))
}

fn format_line_numbered_content(content: &str, start_line: usize) -> String {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| format!("{} | {}", start_line + idx, line))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Applies a validated edit, or only previews it when edits are disabled.
/// The diff preview is appended to the result either way.
async fn finish_edit(edit: &FileEdit, context: &ToolContext) -> ToolResult {
    let preview = context.edits.preview(edit);
    let mut result = if context.config.apply_edits {
        context.edits.apply_edit(edit).await
    } else {
        let stat = diff_stat(&compute_hunks(&edit.old_content, &edit.new_content));
        ToolResult::success(
            APPLY_EDIT_LABEL,
            format!("Dry run: {} was not written ({stat})", edit.path),
        )
    };
    if !result.is_error() && !preview.is_empty() {
        result.result.push_str("\n\n");
        result.result.push_str(&preview);
    }
    result
}

/// The protocol trims bodies, so whole-file content loses its final newline
/// on the way in.
fn restore_trailing_newline(content: &str) -> String {
    if content.is_empty() || content.ends_with('\n') {
        content.to_string()
    } else {
        format!("{content}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanStep, PlanStepStatus};

    #[test]
    fn tool_result_serializes_without_absent_fields() {
        let value = serde_json::to_value(ToolResult::success("read_file", "ok"))
            .expect("result should serialize");
        assert_eq!(
            value,
            serde_json::json!({ "tool": "read_file", "result": "ok" })
        );

        let failed = ToolResult::failure("run_command", "boom").with_result("partial");
        assert!(failed.is_error());
        let value = serde_json::to_value(&failed).expect("result should serialize");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["result"], "partial");
    }

    #[test]
    fn tool_result_carries_plan_snapshot() {
        let plan = PlanSnapshot {
            steps: vec![PlanStep::new("write tests", PlanStepStatus::InProgress)],
        };
        let value = serde_json::to_value(ToolResult::success("update_plan", "").with_plan(plan))
            .expect("result should serialize");
        assert_eq!(value["plan"]["steps"][0]["status"], "in_progress");
    }

    #[test]
    fn parameter_helpers_validate_values() {
        let invocation = ToolInvocation::new("read_file")
            .with_parameter("path", "a.txt")
            .with_parameter("limit", "ten")
            .with_parameter("blank", "  ");

        assert_eq!(required_parameter(&invocation, "path"), Ok("a.txt"));
        assert!(required_parameter(&invocation, "blank").is_err());
        assert!(required_parameter(&invocation, "missing").is_err());
        assert!(optional_u64_parameter(&invocation, "limit").is_err());
        assert_eq!(optional_u64_parameter(&invocation, "offset"), Ok(None));
    }

    #[test]
    fn line_numbers_start_at_offset() {
        assert_eq!(format_line_numbered_content("a\nb\n", 4), "4 | a\n5 | b");
        assert_eq!(format_line_numbered_content("", 1), "");
    }

    #[test]
    fn trailing_newline_is_restored_once() {
        assert_eq!(restore_trailing_newline("x"), "x\n");
        assert_eq!(restore_trailing_newline("x\n"), "x\n");
        assert_eq!(restore_trailing_newline(""), "");
    }

    #[test]
    fn default_registry_exposes_builtin_tools() {
        assert_eq!(
            build_default_registry().names(),
            vec![
                DELETE_FILE_TOOL,
                EDIT_FILE_TOOL,
                READ_FILE_TOOL,
                RUN_COMMAND_TOOL,
                UPDATE_PLAN_TOOL,
                WRITE_FILE_TOOL,
            ]
        );
    }
}
