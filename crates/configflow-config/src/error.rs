//! Error types for configuration loading and validation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while reading, validating or persisting the agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem access failed.
    #[error("configuration io failed")]
    Io {
        /// Operation being performed.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The document could not be parsed.
    #[error("configuration document is not valid JSON")]
    Parse {
        /// Path of the offending document.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The in-memory configuration could not be serialised.
    #[error("failed to serialise configuration")]
    Serialize {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// A field failed validation.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Constraint that was violated.
        reason: &'static str,
        /// Offending value, rendered for diagnostics.
        value: String,
    },
    /// `save` was called on a configuration that was not loaded from disk.
    #[error("configuration has no backing file")]
    Unbacked,
}

impl ConfigError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: impl ToString) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: value.to_string(),
        }
    }
}
