//! Loading, environment overrides and persistence for [`AgentConfig`].
//!
//! # Design
//! - Environment access goes through a lookup closure; `from_env` binds it to
//!   the process environment and tests pass a map.
//! - Blank environment values are treated as unset.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::AgentConfig;

/// Environment variable naming the agent configuration document.
pub const CONFIG_FILE_ENV: &str = "CONFIGFLOW_AGENT_CONFIG";
/// Document location used when [`CONFIG_FILE_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "/etc/configflow-agent/config.json";
/// Overrides `config_path`.
pub const CONFIG_PATH_ENV: &str = "CONFIGFLOW_CONFIG_PATH";
/// Overrides `service_type`.
pub const SERVICE_TYPE_ENV: &str = "CONFIGFLOW_SERVICE_TYPE";
/// Set to exactly `true` to enable the mihomo listener rewrite.
pub const DNS_REWRITE_ENV: &str = "ENABLE_MOSDNS";

impl AgentConfig {
    /// Read and parse the document at `path` without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is not a valid document.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::io("read", path, source))?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.source_path = Some(path.to_path_buf());
        debug!(path = %path.display(), "agent configuration loaded");
        Ok(config)
    }

    /// Load, override and validate using the process environment.
    ///
    /// # Errors
    ///
    /// Propagates load and validation failures.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load, override and validate using `lookup` as the environment.
    ///
    /// # Errors
    ///
    /// Propagates load and validation failures.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = non_blank(&lookup, CONFIG_FILE_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
        let mut config = Self::load(&path)?;
        config.apply_env_overrides(&lookup);
        config.validate()?;
        info!(
            path = %path.display(),
            service_type = %config.service_type,
            config_path = %config.config_path.display(),
            "agent configuration ready"
        );
        Ok(config)
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = non_blank(&lookup, CONFIG_PATH_ENV) {
            self.config_path = PathBuf::from(path);
        }
        if let Some(service_type) = non_blank(&lookup, SERVICE_TYPE_ENV) {
            self.service_type = service_type;
        }
        self.enable_dns_hijack_rewrite =
            lookup(DNS_REWRITE_ENV).is_some_and(|value| value == "true");
    }

    /// Persist the document back to the file it was loaded from.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unbacked`] when there is no source file and
    /// [`ConfigError::Io`] when writing fails.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.source_path.as_deref().ok_or(ConfigError::Unbacked)?;
        let body =
            serde_json::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })?;
        fs::write(path, body).map_err(|source| ConfigError::io("write", path, source))?;
        info!(path = %path.display(), "agent configuration saved");
        Ok(())
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    const DOCUMENT: &str = r#"{
        "server_url": "http://controller:8080",
        "agent_name": "edge-1",
        "agent_host": "edge-1.lan",
        "agent_port": 8081,
        "service_type": "mihomo",
        "service_name": "mihomo",
        "config_path": "/etc/mihomo/config.yaml"
    }"#;

    fn write_document(dir: &TempDir) -> TestResult<PathBuf> {
        let path = dir.path().join("agent.json");
        fs::write(&path, DOCUMENT)?;
        Ok(path)
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn from_lookup_applies_overrides() -> TestResult<()> {
        let dir = TempDir::new()?;
        let path = write_document(&dir)?;
        let path_str = path.to_string_lossy().into_owned();
        let config = AgentConfig::from_lookup(env(&[
            (CONFIG_FILE_ENV, path_str.as_str()),
            (CONFIG_PATH_ENV, "/srv/mosdns/config.yaml"),
            (SERVICE_TYPE_ENV, "mosdns"),
            (DNS_REWRITE_ENV, "true"),
        ]))?;
        assert_eq!(config.config_path, PathBuf::from("/srv/mosdns/config.yaml"));
        assert_eq!(config.service_type, "mosdns");
        assert!(config.enable_dns_hijack_rewrite);
        assert_eq!(config.source_path(), Some(path.as_path()));
        Ok(())
    }

    #[test]
    fn dns_rewrite_requires_exact_true() -> TestResult<()> {
        let dir = TempDir::new()?;
        let mut config = AgentConfig::load(&write_document(&dir)?)?;
        config.apply_env_overrides(env(&[(DNS_REWRITE_ENV, "TRUE")]));
        assert!(!config.enable_dns_hijack_rewrite);
        config.apply_env_overrides(env(&[(DNS_REWRITE_ENV, "1")]));
        assert!(!config.enable_dns_hijack_rewrite);
        config.apply_env_overrides(env(&[(DNS_REWRITE_ENV, " true")]));
        assert!(!config.enable_dns_hijack_rewrite);
        config.apply_env_overrides(env(&[(DNS_REWRITE_ENV, "true")]));
        assert!(config.enable_dns_hijack_rewrite);
        config.apply_env_overrides(env(&[(SERVICE_TYPE_ENV, "  ")]));
        assert_eq!(config.service_type, "mihomo");
        Ok(())
    }

    #[test]
    fn load_reports_parse_errors() -> TestResult<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json")?;
        assert!(matches!(
            AgentConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            AgentConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io { operation: "read", .. })
        ));
        Ok(())
    }

    #[test]
    fn save_round_trips_registration() -> TestResult<()> {
        let dir = TempDir::new()?;
        let path = write_document(&dir)?;
        let mut config = AgentConfig::load(&path)?;
        config.agent_id = Some("agent-42".to_string());
        config.token = Some("secret".to_string());
        config.save()?;

        let reloaded = AgentConfig::load(&path)?;
        assert!(reloaded.is_registered());
        assert_eq!(reloaded.agent_id.as_deref(), Some("agent-42"));
        Ok(())
    }

    #[test]
    fn save_without_source_is_rejected() -> TestResult<()> {
        let dir = TempDir::new()?;
        let mut config = AgentConfig::load(&write_document(&dir)?)?;
        config.source_path = None;
        assert!(matches!(config.save(), Err(ConfigError::Unbacked)));
        Ok(())
    }
}
