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

//! Binary entrypoint for the configuration agent.

use configflow_app::{AppResult, run_app};

/// Boots the agent and blocks until the API server stops.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
