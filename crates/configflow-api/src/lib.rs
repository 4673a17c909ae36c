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
#![allow(clippy::module_name_repetitions)]

//! HTTP surface of the agent: health probe and the authenticated
//! configuration update endpoint.
//!
//! Layout: `http/router.rs` (`ApiServer`), `http/auth.rs` (bearer-token
//! middleware), `http/handlers.rs` (route handlers), `http/errors.rs`
//! (`ApiError`), `http/constants.rs`, `state.rs`, `error.rs`
//! (`ApiServerError`).

pub mod error;
pub(crate) mod http;
pub(crate) mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
