//! Final commit of the configuration document, with rollback from the
//! transaction's snapshot.
//!
//! # Design
//! - No read-back or checksum after a successful write.
//! - Rollback copies the snapshot's file to a sibling staging file and renames
//!   it over the live path; the snapshot is never modified.
//! - Ownership normalisation is best-effort and only logged.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::profile::{Hook, ServiceProfile};

#[cfg(unix)]
use nix::unistd::{chown, getgid, getuid};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use walkdir::WalkDir;

/// Writes the managed configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigWriter {
    normalize_ownership: bool,
}

impl ConfigWriter {
    /// Writer that optionally reassigns the config tree to the current uid/gid.
    #[must_use]
    pub const fn new(normalize_ownership: bool) -> Self {
        Self {
            normalize_ownership,
        }
    }

    /// Writer configured from the profile's hooks.
    #[must_use]
    pub fn for_profile(profile: ServiceProfile) -> Self {
        Self::new(profile.enables(Hook::OwnershipFixup))
    }

    /// Replace `path` with `content`.
    ///
    /// On write failure the previous file is restored from
    /// `backup_path/<file name>` when the snapshot holds one, and the write
    /// error is returned regardless.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` has no parent or file name, if the parent
    /// cannot be created, or if the write fails.
    pub fn commit(&self, path: &Path, content: &str, backup_path: Option<&Path>) -> FsOpsResult<()> {
        let (parent, file_name) = split(path)?;
        fs::create_dir_all(parent)
            .map_err(|err| FsOpsError::io("commit.create_parent", parent, err))?;

        if self.normalize_ownership {
            normalize_ownership(parent);
        }

        info!(path = %path.display(), bytes = content.len(), "writing configuration");
        match write_document(path, content) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "configuration write failed");
                if let Some(snapshot) = backup_path {
                    restore(snapshot, parent, file_name, path);
                }
                Err(err)
            }
        }
    }
}

fn split(path: &Path) -> FsOpsResult<(&Path, &str)> {
    let invalid = || FsOpsError::InvalidInput {
        field: "config_path",
        reason: "must name a file inside a directory",
        value: Some(path.to_string_lossy().into_owned()),
    };
    let file_name = path.file_name().and_then(|name| name.to_str()).ok_or_else(invalid)?;
    let parent = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => return Err(invalid()),
    };
    Ok((parent, file_name))
}

fn write_document(path: &Path, content: &str) -> FsOpsResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);
    let mut file = options
        .open(path)
        .map_err(|err| FsOpsError::io("commit.open", path, err))?;
    file.write_all(content.as_bytes())
        .map_err(|err| FsOpsError::io("commit.write", path, err))
}

fn restore(snapshot: &Path, parent: &Path, file_name: &str, path: &Path) {
    let source = snapshot.join(file_name);
    if !source.is_file() {
        warn!(snapshot = %snapshot.display(), "snapshot holds no copy of the configuration; nothing restored");
        return;
    }
    let staging: PathBuf = parent.join(format!(".{file_name}.restore"));
    let outcome = fs::copy(&source, &staging)
        .map_err(|err| FsOpsError::io("rollback.copy", &staging, err))
        .and_then(|_| {
            fs::rename(&staging, path).map_err(|err| FsOpsError::io("rollback.rename", path, err))
        });
    match outcome {
        Ok(()) => info!(path = %path.display(), source = %source.display(), "previous configuration restored"),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "rollback failed");
            let _ = fs::remove_file(&staging);
        }
    }
}

#[cfg(unix)]
fn normalize_ownership(root: &Path) {
    let uid = getuid();
    let gid = getgid();
    info!(root = %root.display(), uid = uid.as_raw(), gid = gid.as_raw(), "normalising ownership");
    let mut failures = 0_usize;
    for entry in WalkDir::new(root) {
        let result = entry
            .map_err(|source| FsOpsError::walkdir("ownership.walk", root, source))
            .and_then(|entry| {
                chown(entry.path(), Some(uid), Some(gid)).map_err(|source| FsOpsError::Nix {
                    operation: "ownership.chown",
                    path: entry.path().to_path_buf(),
                    source,
                })
            });
        if let Err(err) = result {
            failures += 1;
            warn!(root = %root.display(), error = %err, "ownership change failed");
        }
    }
    if failures > 0 {
        warn!(root = %root.display(), failures, "ownership normalisation incomplete");
    }
}

#[cfg(not(unix))]
fn normalize_ownership(root: &Path) {
    warn!(root = %root.display(), "ownership normalisation is unix only; skipped");
}
