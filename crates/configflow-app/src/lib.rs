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

//! Agent wiring: controller registration, heartbeats and update transactions.
//!
//! Layout: `bootstrap.rs` (service wiring), `controller.rs` (register and
//! heartbeat client), `orchestrator.rs` (update transactions),
//! `transform.rs` (listener rewrite), `error.rs` (`AppError`).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Controller registration and heartbeat client.
pub mod controller;
/// Application error types.
pub mod error;
/// Update transaction orchestration.
pub mod orchestrator;
/// Configuration document rewriting.
pub mod transform;

pub use bootstrap::run_app;
pub use controller::{ControllerClient, HeartbeatSettings, ServiceStatus};
pub use error::{AppError, AppResult};
pub use orchestrator::{Orchestrator, TransactionReport, TransactionState, UpdateSettings};
