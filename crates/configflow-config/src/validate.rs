//! Field validation for [`AgentConfig`].

use crate::error::{ConfigError, ConfigResult};
use crate::model::AgentConfig;

impl AgentConfig {
    /// Check the invariants the agent relies on at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.config_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "config_path",
                "must not be empty",
                self.config_path.display(),
            ));
        }
        if self.config_path.file_name().is_none() {
            return Err(ConfigError::invalid(
                "config_path",
                "must name a file",
                self.config_path.display(),
            ));
        }
        if self.agent_port == 0 {
            return Err(ConfigError::invalid(
                "agent_port",
                "must be non-zero",
                self.agent_port,
            ));
        }
        if self.heartbeat_interval == 0 {
            return Err(ConfigError::invalid(
                "heartbeat_interval",
                "must be greater than zero",
                self.heartbeat_interval,
            ));
        }
        Ok(())
    }
}
