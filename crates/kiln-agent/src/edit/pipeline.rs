use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::guard::{reject_elision, reject_empty_overwrite};
use super::section::replace_unique;
use super::syntax::SyntaxCheckers;
use crate::context::{ContextInvalidator, NoopContextInvalidator};
use crate::diff::{compute_hunks, diff_stat, render_unified};
use crate::execution::ExecutionEnvironment;
use crate::tools::ToolResult;
use crate::{ToolError, display_path};

pub const APPLY_EDIT_LABEL: &str = "apply_edit";

/// A proposed, not yet applied, file mutation.
///
/// `old_content` is the file as it was read at propose time (empty for a new
/// file). It is the baseline for previews and diff stats and is never
/// re-read at apply time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: String,
    pub old_content: String,
    pub new_content: String,
    pub description: String,
}

impl FileEdit {
    pub fn is_new_file(&self) -> bool {
        self.old_content.is_empty()
    }
}

#[derive(Clone)]
pub struct EditPipeline {
    env: Arc<dyn ExecutionEnvironment>,
    syntax: SyntaxCheckers,
    invalidator: Arc<dyn ContextInvalidator>,
}

impl EditPipeline {
    pub fn new(env: Arc<dyn ExecutionEnvironment>) -> Self {
        Self {
            env,
            syntax: SyntaxCheckers::with_defaults(),
            invalidator: Arc::new(NoopContextInvalidator),
        }
    }

    pub fn with_syntax_checkers(mut self, syntax: SyntaxCheckers) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn ContextInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    pub fn environment(&self) -> &Arc<dyn ExecutionEnvironment> {
        &self.env
    }

    /// Validates a whole-file replacement without touching disk.
    pub async fn propose_edit(
        &self,
        path: &str,
        new_content: &str,
        description: &str,
    ) -> Result<FileEdit, ToolError> {
        let old_content = self.env.read_file_if_exists(path).await?.unwrap_or_default();
        reject_empty_overwrite(path, &old_content, new_content)?;
        reject_elision(path, new_content)?;
        self.syntax.check(path, new_content)?;

        debug!(path, bytes = new_content.len(), "edit proposed");
        Ok(FileEdit {
            path: path.to_string(),
            old_content,
            new_content: new_content.to_string(),
            description: description.to_string(),
        })
    }

    /// Validates replacing the single occurrence of `old_text` with
    /// `new_text` in an existing file.
    pub async fn edit_section(
        &self,
        path: &str,
        old_text: &str,
        new_text: &str,
        description: &str,
    ) -> Result<FileEdit, ToolError> {
        self.edit_sections(path, &[(old_text, new_text)], description)
            .await
    }

    /// Applies several unique replacements in order, each against the result
    /// of the previous one. Syntax is checked once, on the final content.
    pub async fn edit_sections(
        &self,
        path: &str,
        replacements: &[(&str, &str)],
        description: &str,
    ) -> Result<FileEdit, ToolError> {
        if replacements.is_empty() {
            return Err(ToolError::Validation(format!(
                "no replacements given for '{path}'"
            )));
        }
        let old_content = self.env.read_file(path).await?;
        let mut new_content = old_content.clone();
        for (old_text, new_text) in replacements {
            reject_elision(path, new_text)?;
            new_content = replace_unique(&new_content, path, old_text, new_text)?;
        }
        self.syntax.check(path, &new_content)?;

        debug!(path, sections = replacements.len(), "section edit proposed");
        Ok(FileEdit {
            path: path.to_string(),
            old_content,
            new_content,
            description: description.to_string(),
        })
    }

    /// Unified diff between the snapshot and the proposal.
    pub fn preview(&self, edit: &FileEdit) -> String {
        render_unified(&self.display_name(&edit.path), &edit.old_content, &edit.new_content)
    }

    /// Writes the proposal. This is the only place an edit reaches disk; it
    /// does not re-run validation.
    pub async fn apply_edit(&self, edit: &FileEdit) -> ToolResult {
        if let Err(error) = self.env.write_file(&edit.path, &edit.new_content).await {
            return ToolResult::failure(APPLY_EDIT_LABEL, error.to_string());
        }

        let stat = diff_stat(&compute_hunks(&edit.old_content, &edit.new_content));
        let shown = self.display_name(&edit.path);
        info!(path = %shown, added = stat.added, removed = stat.removed, "edit applied");
        self.invalidator.invalidate(self.env.working_directory());

        let verb = if edit.is_new_file() { "Created" } else { "Updated" };
        let mut message = format!("{verb} {shown} ({stat})");
        if !edit.description.trim().is_empty() {
            message.push_str(": ");
            message.push_str(edit.description.trim());
        }
        ToolResult::success(APPLY_EDIT_LABEL, message)
    }

    pub async fn delete_file(&self, path: &str) -> ToolResult {
        let shown = self.display_name(path);
        match self.env.file_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                return ToolResult::failure(
                    "delete_file",
                    format!("cannot delete '{shown}': file does not exist"),
                );
            }
            Err(error) => return ToolResult::failure("delete_file", error.to_string()),
        }

        if let Err(error) = self.env.delete_file(path).await {
            return ToolResult::failure("delete_file", error.to_string());
        }
        info!(path = %shown, "file deleted");
        self.invalidator.invalidate(self.env.working_directory());
        ToolResult::success("delete_file", format!("Deleted {shown}"))
    }

    fn display_name(&self, path: &str) -> String {
        display_path(&self.env.resolve(path), self.env.working_directory())
    }
}
