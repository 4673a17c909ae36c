#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Logging primitives shared across the agent workspace.
//!
//! Layout: `init.rs` (subscriber installation and format selection),
//! `error.rs` (`TelemetryError`).

pub mod error;
pub mod init;

pub use error::{Result, TelemetryError};
pub use init::{
    AGENT_VERSION, DEFAULT_LOG_LEVEL, LOG_FORMAT_ENV, LogFormat, LoggingConfig, build_sha,
    init_logging,
};
