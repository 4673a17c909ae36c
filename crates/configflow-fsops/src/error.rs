//! # Design
//!
//! - Constant messages; the operation label and path travel as fields.
//! - Source errors are preserved, never interpolated.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while backing up, materialising or committing configuration.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Nix syscall failures.
    #[error("fsops nix failure")]
    Nix {
        /// Operation that triggered the nix failure.
        operation: &'static str,
        /// Path involved in the nix failure.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Operation label carried by the error, when it has one.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Io { operation, .. }
            | Self::Walkdir { operation, .. }
            | Self::Nix { operation, .. } => Some(operation),
            Self::InvalidInput { .. } => None,
        }
    }
}
