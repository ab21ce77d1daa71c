//! Action-execution substrate for a coding-assistant CLI.
//!
//! Model text goes in through [`parse_tool_calls`]; the resulting
//! invocations are dispatched by a [`ToolRegistry`] onto the edit pipeline,
//! the process supervisor and the plan store. Every invocation comes back as
//! a [`ToolResult`].

pub mod config;
pub mod context;
pub mod diff;
pub mod edit;
pub mod errors;
pub mod events;
pub mod exec;
pub mod execution;
pub mod paths;
pub mod plan;
pub mod protocol;
pub mod tools;
pub mod truncation;

pub use config::*;
pub use context::*;
pub use diff::{
    DIFF_CONTEXT_LINES, DiffHunk, DiffStat, compute_hunks, diff_stat, normalize_line_endings,
    render_hunks, render_unified,
};
pub use edit::{EditPipeline, FileEdit, SyntaxChecker, SyntaxCheckers, SyntaxIssue};
pub use errors::*;
pub use events::*;
pub use exec::{CommandRunner, ExecOutcome, ProcessSupervisor};
pub use execution::*;
pub use paths::{display_path, resolve_path};
pub use plan::*;
pub use protocol::{ParseReport, ToolInvocation, parse_tool_calls, parse_tool_calls_with_report};
pub use tools::{
    ToolContext, ToolDefinition, ToolRegistry, ToolResult, build_default_registry, quiet_context,
};
pub use truncation::*;
