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

//! File-backed agent configuration with environment overrides.
//!
//! Layout: `model.rs` (`AgentConfig`), `loader.rs` (load/save and env
//! overrides), `validate.rs` (field validation), `defaults.rs` (fallback
//! values), `error.rs` (`ConfigError`).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_FILE_ENV, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, DNS_REWRITE_ENV, SERVICE_TYPE_ENV,
};
pub use model::AgentConfig;
