use std::sync::Arc;

use configflow_api::ApiServer;
use configflow_config::AgentConfig;
use configflow_telemetry::LoggingConfig;
use tracing::info;

use crate::controller::{ControllerClient, HeartbeatSettings};
use crate::error::{AppError, AppResult};
use crate::orchestrator::Orchestrator;

/// Entry point for the agent boot sequence.
///
/// # Errors
///
/// Returns an error if logging, configuration, registration or the API
/// server fails.
pub async fn run_app() -> AppResult<()> {
    let logging =
        LoggingConfig::from_env().map_err(|err| AppError::telemetry("telemetry.env", err))?;
    configflow_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let config =
        AgentConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
    run_app_with(config).await
}

/// Boot sequence over an already loaded configuration.
pub(crate) async fn run_app_with(mut config: AgentConfig) -> AppResult<()> {
    info!(
        agent = %config.agent_name,
        service_type = %config.service_type,
        config_path = %config.config_path.display(),
        "agent bootstrap starting"
    );

    let controller = ControllerClient::new(&config.server_url)?;
    if !config.is_registered() {
        controller.register(&mut config).await?;
    }

    let heartbeat = controller.spawn_heartbeat(HeartbeatSettings::from_config(&config));
    let orchestrator = Orchestrator::from_config(&config)?;
    let server = ApiServer::new(
        config.token.clone().unwrap_or_default(),
        Arc::new(orchestrator),
    );

    let result = server.serve(config.listen_addr()).await;
    heartbeat.abort();
    result.map_err(|err| AppError::api_server("api.serve", err))
}
