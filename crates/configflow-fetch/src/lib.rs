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

//! Artifact fetching with a fixed concurrency ceiling.
//!
//! Layout: `downloader.rs` (`BoundedDownloader`), `fetcher.rs`
//! (`ArtifactFetcher` seam and the reqwest implementation), `resolver.rs`
//! (public DNS resolver that bypasses the host's stub), `error.rs`
//! (`FetchError`).

pub mod downloader;
pub mod error;
pub mod fetcher;
pub mod resolver;

pub use downloader::{BoundedDownloader, DEFAULT_CONCURRENCY, DownloadReport};
pub use error::{FetchError, FetchResult};
pub use fetcher::{ArtifactFetcher, HttpFetcher, USER_AGENT};
pub use resolver::{FALLBACK_DNS, PRIMARY_DNS, PublicDnsResolver};
