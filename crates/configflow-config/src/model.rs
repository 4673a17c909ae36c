//! The agent configuration document.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Agent identity, controller endpoint and managed-service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the controller, without a trailing slash.
    pub server_url: String,
    /// Display name reported at registration.
    pub agent_name: String,
    /// Host name reported when `agent_ip` is unset.
    pub agent_host: String,
    /// Port the agent's HTTP surface listens on.
    pub agent_port: u16,
    /// Address advertised to the controller in preference to `agent_host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_ip: Option<String>,
    /// Managed service identifier (`mihomo`, `mosdns`, ...).
    #[serde(default)]
    pub service_type: String,
    /// systemd unit probed for heartbeat status.
    #[serde(default)]
    pub service_name: String,
    /// Canonical path of the managed service's configuration file.
    pub config_path: PathBuf,
    /// Free-form deployment label forwarded at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_method: Option<String>,
    /// Heartbeat cadence in seconds.
    #[serde(default = "defaults::heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Identifier assigned by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Bearer token assigned by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Address the HTTP surface binds to.
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: IpAddr,
    /// Enables the mihomo listener rewrite; sourced from the environment only.
    #[serde(skip)]
    pub enable_dns_hijack_rewrite: bool,
    #[serde(skip)]
    pub(crate) source_path: Option<PathBuf>,
}

impl AgentConfig {
    /// Directory holding the managed configuration file.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Basename of the managed configuration file.
    #[must_use]
    pub fn config_file_name(&self) -> String {
        self.config_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the controller has issued both an identifier and a token.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.agent_id.as_deref().is_some_and(|id| !id.is_empty())
            && self.token.as_deref().is_some_and(|token| !token.is_empty())
    }

    /// Interval between heartbeats.
    #[must_use]
    pub const fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    /// Socket address the HTTP surface binds to.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.agent_port)
    }

    /// Path the document was loaded from, if any.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}
