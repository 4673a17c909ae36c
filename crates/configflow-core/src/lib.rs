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

//! Transport-agnostic configuration update requests and the seam between the
//! HTTP surface and the update orchestrator.
//!
//! Layout: `model.rs` (request DTOs), `paths.rs` (config-dir relative path
//! resolution), `service.rs` (`ConfigUpdater`).

pub mod model;
pub mod paths;
pub mod service;

pub use model::{ArtifactKind, CustomFile, DownloadItem, UpdateRequest};
pub use paths::resolve_under;
pub use service::ConfigUpdater;
