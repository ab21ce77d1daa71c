use thiserror::Error;

/// Top-level error type for the kiln-agent crate.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("execution environment error: {0}")]
    Execution(String),
    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Errors raised by individual tools before or while they run.
///
/// `Validation` covers every propose-time safety violation and is always
/// raised before the filesystem is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Execution(String),
    #[error("failed to access '{path}': {message}")]
    Io { path: String, message: String },
}

impl ToolError {
    pub fn io(path: impl Into<String>, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl AgentError {
    pub fn io(path: impl Into<String>, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}
