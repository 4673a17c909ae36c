//! # Design
//!
//! - Constant messages with the URL, path or status carried as fields.
//! - Every failure is scoped to one artifact; batch-level errors do not exist.

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised while fetching or writing a single artifact.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Local filesystem failure.
    #[error("artifact io failure")]
    Io {
        /// Operation being performed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Transport-level failure.
    #[error("artifact request failed")]
    Http {
        /// Operation being performed.
        operation: &'static str,
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The server answered with something other than 200.
    #[error("artifact request returned unexpected status")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code received.
        status: u16,
    },
    /// The item carries neither inline content nor a URL.
    #[error("artifact has no source")]
    MissingSource {
        /// Item name.
        name: String,
    },
    /// Every configured name server failed to resolve the host.
    #[error("name resolution failed")]
    Resolve {
        /// Host being resolved.
        host: String,
        /// Last server tried.
        server: IpAddr,
        /// Underlying resolver error.
        source: hickory_resolver::ResolveError,
    },
    /// A name server answered but returned no addresses.
    #[error("name resolution returned no addresses")]
    NoAddresses {
        /// Host being resolved.
        host: String,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    ClientBuild {
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The admission gate was closed before a slot was granted.
    #[error("download admission closed")]
    AdmissionClosed,
    /// The worker task ended without reporting an outcome.
    #[error("download task did not complete")]
    TaskLost,
}

impl FetchError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn http(operation: &'static str, url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            operation,
            url: url.to_string(),
            source,
        }
    }
}
