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

//! Filesystem side of a configuration update: service profiles, snapshot
//! backups with retention, artifact materialisation and the final commit.
//!
//! Layout: `profile.rs` (`ServiceProfile`, `BackupScope`, `Hook`),
//! `backup.rs` (`BackupManager`), `retention.rs` (`RetentionPolicy`),
//! `materialize.rs` (cache seed, directories, custom files), `writer.rs`
//! (`ConfigWriter`), `error.rs` (`FsOpsError`).

pub mod backup;
pub mod error;
pub mod materialize;
pub mod profile;
pub mod retention;
pub mod writer;

pub use backup::{BACKUP_DIR_NAME, BackupManager, BackupReport};
pub use error::{FsOpsError, FsOpsResult};
pub use materialize::{CACHE_DUMP_FILE, create_directories, ensure_cache_dump, write_custom_files};
pub use profile::{BackupScope, Hook, ServiceProfile};
pub use retention::{MAX_BACKUPS, PruneReport, RetentionPolicy, SNAPSHOT_FORMAT};
pub use writer::ConfigWriter;
