//! # Design
//!
//! - Centralize agent-level errors for bootstrap, registration and updates.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

use crate::transform::TransformError;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: configflow_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: configflow_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: configflow_telemetry::TelemetryError,
    },
    /// Filesystem operations inside an update failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: configflow_fsops::FsOpsError,
    },
    /// Building the artifact fetcher failed.
    #[error("fetcher construction failed")]
    Fetch {
        /// Operation identifier.
        operation: &'static str,
        /// Source fetch error.
        source: configflow_fetch::FetchError,
    },
    /// The configuration document could not be rewritten.
    #[error("configuration transform failed")]
    Transform {
        /// Source transform error.
        source: TransformError,
    },
    /// HTTP client operations failed.
    #[error("http operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// HTTP response returned a non-success status.
    #[error("http response status error")]
    HttpStatus {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// HTTP status code returned by the server.
        status: u16,
    },
    /// The controller answered but refused the registration.
    #[error("registration rejected by controller")]
    RegistrationRejected {
        /// URL used for the request.
        url: String,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: configflow_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: configflow_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: configflow_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn fsops(
        operation: &'static str,
        source: configflow_fsops::FsOpsError,
    ) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) const fn fetch(
        operation: &'static str,
        source: configflow_fetch::FetchError,
    ) -> Self {
        Self::Fetch { operation, source }
    }

    pub(crate) const fn http(operation: &'static str, url: String, source: reqwest::Error) -> Self {
        Self::Http {
            operation,
            url,
            source,
        }
    }
}

impl From<TransformError> for AppError {
    fn from(source: TransformError) -> Self {
        Self::Transform { source }
    }
}
