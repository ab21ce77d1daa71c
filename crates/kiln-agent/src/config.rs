use std::collections::HashMap;

use crate::{AgentError, tools};

pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 120_000;
pub const MAX_COMMAND_TIMEOUT_MS: u64 = 600_000;
pub const DEFAULT_KILL_GRACE_MS: u64 = 5_000;

/// Runtime configuration shared by every tool dispatched in one run.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    pub default_command_timeout_ms: u64,
    pub max_command_timeout_ms: u64,
    pub kill_grace_ms: u64,
    /// When false, edits are validated and previewed but never written.
    pub apply_edits: bool,
    pub tool_output_limits: HashMap<String, usize>,
    pub tool_line_limits: HashMap<String, usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            max_command_timeout_ms: MAX_COMMAND_TIMEOUT_MS,
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
            apply_edits: true,
            tool_output_limits: default_tool_output_limits(),
            tool_line_limits: default_tool_line_limits(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.default_command_timeout_ms == 0 {
            return Err(AgentError::InvalidConfiguration(
                "default_command_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_command_timeout_ms < self.default_command_timeout_ms {
            return Err(AgentError::InvalidConfiguration(format!(
                "max_command_timeout_ms ({}) is below default_command_timeout_ms ({})",
                self.max_command_timeout_ms, self.default_command_timeout_ms
            )));
        }
        Ok(())
    }

    /// Resolves the timeout a command should run with: the requested value
    /// clamped to the configured maximum, or the default when absent or zero.
    pub fn effective_timeout_ms(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(0) | None => self.default_command_timeout_ms,
            Some(value) => value.min(self.max_command_timeout_ms.max(1)),
        }
    }
}

pub fn default_tool_output_limits() -> HashMap<String, usize> {
    HashMap::from([
        (tools::READ_FILE_TOOL.to_string(), 50_000),
        (tools::RUN_COMMAND_TOOL.to_string(), 30_000),
        (tools::WRITE_FILE_TOOL.to_string(), 10_000),
        (tools::EDIT_FILE_TOOL.to_string(), 10_000),
        (tools::DELETE_FILE_TOOL.to_string(), 1_000),
        (tools::UPDATE_PLAN_TOOL.to_string(), 5_000),
    ])
}

pub fn default_tool_line_limits() -> HashMap<String, usize> {
    HashMap::from([(tools::RUN_COMMAND_TOOL.to_string(), 256)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_config_defaults_match_baseline() {
        let config = AgentConfig::default();
        assert_eq!(config.default_command_timeout_ms, 120_000);
        assert_eq!(config.max_command_timeout_ms, 600_000);
        assert_eq!(config.kill_grace_ms, 5_000);
        assert!(config.apply_edits);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn effective_timeout_uses_default_and_clamps_to_max() {
        let config = AgentConfig::default();
        assert_eq!(config.effective_timeout_ms(None), 120_000);
        assert_eq!(config.effective_timeout_ms(Some(0)), 120_000);
        assert_eq!(config.effective_timeout_ms(Some(250)), 250);
        assert_eq!(config.effective_timeout_ms(Some(9_999_999)), 600_000);
    }

    #[test]
    fn validate_rejects_max_below_default() {
        let config = AgentConfig {
            max_command_timeout_ms: 10,
            ..AgentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AgentError::InvalidConfiguration(_))
        ));
    }
}
