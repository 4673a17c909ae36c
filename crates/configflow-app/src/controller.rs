//! Controller client: registration and periodic heartbeats.

use std::time::Duration;

use configflow_config::AgentConfig;
use configflow_telemetry::AGENT_VERSION;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Timeout applied to every controller request.
pub const CONTROLLER_TIMEOUT: Duration = Duration::from_secs(10);

/// Deployment method reported when the config does not name one.
const DEFAULT_DEPLOYMENT_METHOD: &str = "script";

/// Liveness of the managed service as reported in heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// The service manager reports the unit as active.
    Running,
    /// The unit exists but is not active.
    Stopped,
    /// The status could not be determined.
    Unknown,
}

impl ServiceStatus {
    /// Wire label sent to the controller.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }

    /// Query the service manager for `service_name`.
    pub async fn probe(service_name: &str) -> Self {
        if service_name.is_empty() {
            return Self::Unknown;
        }
        match Command::new("systemctl")
            .args(["is-active", service_name])
            .output()
            .await
        {
            Ok(output) if String::from_utf8_lossy(&output.stdout).trim() == "active" => {
                Self::Running
            }
            Ok(_) => Self::Stopped,
            Err(err) => {
                debug!(service = service_name, error = %err, "service status probe failed");
                Self::Unknown
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    host: &'a str,
    port: u16,
    service_type: &'a str,
    deployment_method: &'a str,
    version: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    success: bool,
    #[serde(default)]
    id: String,
    #[serde(default)]
    token: String,
}

#[derive(Debug, Serialize)]
struct HeartbeatRequest<'a> {
    version: &'a str,
    service_status: &'a str,
}

/// Identity and schedule used by the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSettings {
    /// Identifier assigned at registration.
    pub agent_id: String,
    /// Bearer token assigned at registration.
    pub token: String,
    /// Managed service probed for its status.
    pub service_name: String,
    /// Delay between heartbeats.
    pub period: Duration,
}

impl HeartbeatSettings {
    /// Settings for `config`, empty when the agent is not registered.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            agent_id: config.agent_id.clone().unwrap_or_default(),
            token: config.token.clone().unwrap_or_default(),
            service_name: config.service_name.clone(),
            period: config.heartbeat_period(),
        }
    }

    const fn is_complete(&self) -> bool {
        !self.agent_id.is_empty() && !self.token.is_empty()
    }
}

/// HTTP client for the controller API.
#[derive(Debug, Clone)]
pub struct ControllerClient {
    http: reqwest::Client,
    server_url: String,
}

impl ControllerClient {
    /// Client targeting `server_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(server_url: &str) -> AppResult<Self> {
        let server_url = server_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(CONTROLLER_TIMEOUT)
            .user_agent(configflow_fetch::USER_AGENT)
            .build()
            .map_err(|err| AppError::http("controller.client", server_url.clone(), err))?;
        Ok(Self { http, server_url })
    }

    /// Register the agent and persist the issued identity into `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the controller answers with a
    /// non-200 status or `success: false`, or the config cannot be saved.
    pub async fn register(&self, config: &mut AgentConfig) -> AppResult<()> {
        let url = format!("{}/api/agents/register", self.server_url);
        let host = config
            .agent_ip
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .unwrap_or(&config.agent_host);
        let body = RegisterRequest {
            name: &config.agent_name,
            host,
            port: config.agent_port,
            service_type: &config.service_type,
            deployment_method: config
                .deployment_method
                .as_deref()
                .unwrap_or(DEFAULT_DEPLOYMENT_METHOD),
            version: AGENT_VERSION,
        };
        info!(url = %url, host, "registering with controller");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::http("controller.register", url.clone(), err))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(AppError::HttpStatus {
                operation: "controller.register",
                url,
                status: status.as_u16(),
            });
        }
        let reply: RegisterResponse = response
            .json()
            .await
            .map_err(|err| AppError::http("controller.register.decode", url.clone(), err))?;
        if !reply.success {
            return Err(AppError::RegistrationRejected { url });
        }

        config.agent_id = Some(reply.id);
        config.token = Some(reply.token);
        config
            .save()
            .map_err(|err| AppError::config("controller.register.save", err))?;
        info!(agent_id = ?config.agent_id, "registration completed");
        Ok(())
    }

    /// Send one heartbeat.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the controller answers with a
    /// non-200 status.
    pub async fn heartbeat(
        &self,
        agent_id: &str,
        token: &str,
        status: ServiceStatus,
    ) -> AppResult<()> {
        let url = format!("{}/api/agents/{agent_id}/heartbeat", self.server_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&HeartbeatRequest {
                version: AGENT_VERSION,
                service_status: status.as_str(),
            })
            .send()
            .await
            .map_err(|err| AppError::http("controller.heartbeat", url.clone(), err))?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(AppError::HttpStatus {
                operation: "controller.heartbeat",
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Probe the service and send a heartbeat, logging any failure.
    ///
    /// Skipped when the agent has no identity yet.
    pub async fn beat(&self, settings: &HeartbeatSettings) {
        if !settings.is_complete() {
            debug!("agent not registered; heartbeat skipped");
            return;
        }
        let status = ServiceStatus::probe(&settings.service_name).await;
        match self
            .heartbeat(&settings.agent_id, &settings.token, status)
            .await
        {
            Ok(()) => debug!(status = status.as_str(), "heartbeat sent"),
            Err(err) => warn!(error = ?err, "heartbeat failed"),
        }
    }

    /// Spawn the heartbeat loop. The first beat is sent immediately.
    #[must_use]
    pub fn spawn_heartbeat(self, settings: HeartbeatSettings) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(settings.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.beat(&settings).await;
            }
        })
    }
}
