use crate::{ToolError, resolve_path};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File access used by the edit pipeline and the file tools. Paths are
/// resolved against [`ExecutionEnvironment::working_directory`].
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<String, ToolError>;
    async fn write_file(&self, path: &str, content: &str) -> Result<(), ToolError>;
    async fn delete_file(&self, path: &str) -> Result<(), ToolError>;
    async fn file_exists(&self, path: &str) -> Result<bool, ToolError>;

    /// Reads `path`, returning `None` when the file does not exist.
    async fn read_file_if_exists(&self, path: &str) -> Result<Option<String>, ToolError> {
        if !self.file_exists(path).await? {
            return Ok(None);
        }
        self.read_file(path).await.map(Some)
    }

    fn working_directory(&self) -> &Path;

    fn resolve(&self, path: &str) -> PathBuf {
        resolve_path(path, self.working_directory())
    }
}

#[derive(Clone, Debug)]
pub struct LocalExecutionEnvironment {
    working_directory: PathBuf,
}

impl LocalExecutionEnvironment {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
        }
    }
}

#[async_trait]
impl ExecutionEnvironment for LocalExecutionEnvironment {
    async fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path);
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|error| ToolError::io(resolved.display().to_string(), &error))
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), ToolError> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| ToolError::io(parent.display().to_string(), &error))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|error| ToolError::io(resolved.display().to_string(), &error))
    }

    async fn delete_file(&self, path: &str) -> Result<(), ToolError> {
        let resolved = self.resolve(path);
        tokio::fs::remove_file(&resolved)
            .await
            .map_err(|error| ToolError::io(resolved.display().to_string(), &error))
    }

    async fn file_exists(&self, path: &str) -> Result<bool, ToolError> {
        let resolved = self.resolve(path);
        match tokio::fs::metadata(&resolved).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(ToolError::io(resolved.display().to_string(), &error)),
        }
    }

    fn working_directory(&self) -> &Path {
        &self.working_directory
    }
}
