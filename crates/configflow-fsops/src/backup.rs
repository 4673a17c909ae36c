//! Snapshot-then-clean of the live config directory.
//!
//! # Design
//! - Degrade, never abort: per-entry copy or removal failures are logged and
//!   collected in the report.
//! - Directories are copied with their mode; regular files are copied and
//!   synced. Symlinks are followed and their targets' content copied; the links
//!   themselves and special files are not recreated.
//! - Snapshots are never reused: a name already taken in the same second moves
//!   forward to the next free second.
//! - Retention runs after copying and before cleaning so the newest snapshot is
//!   always counted.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};
use crate::profile::BackupScope;
use crate::retention::{RetentionPolicy, SNAPSHOT_FORMAT};

/// Name of the backup root inside the config directory.
pub const BACKUP_DIR_NAME: &str = "backup";

/// Takes snapshots of a config directory and prunes old ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupManager {
    retention: RetentionPolicy,
}

/// Outcome of one snapshot-and-clean pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Snapshot directory for this pass.
    pub path: PathBuf,
    /// Whether `path` was created by this pass. When false nothing was
    /// copied or removed and `path` must not be used as a restore source.
    pub created: bool,
    /// Entry names copied into the snapshot.
    pub copied: Vec<String>,
    /// Entry names removed from the live directory.
    pub removed: Vec<String>,
    /// Entry names whose copy or removal failed.
    pub failures: Vec<String>,
    /// Expired snapshots deleted by retention during this pass.
    pub pruned: Vec<PathBuf>,
}

impl BackupReport {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            created: true,
            copied: Vec::new(),
            removed: Vec::new(),
            failures: Vec::new(),
            pruned: Vec::new(),
        }
    }

    /// Whether every in-scope entry was copied and removed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl BackupManager {
    /// Manager applying `retention` after each snapshot.
    #[must_use]
    pub const fn new(retention: RetentionPolicy) -> Self {
        Self { retention }
    }

    /// Snapshot the in-scope entries of `config_dir` under `backup/<now>` and
    /// remove them from the live directory.
    #[must_use]
    pub fn snapshot_and_clean(&self, config_dir: &Path, scope: &BackupScope) -> BackupReport {
        self.snapshot_and_clean_at(config_dir, scope, Local::now().naive_local())
    }

    /// As [`Self::snapshot_and_clean`] with an explicit snapshot time.
    #[must_use]
    pub fn snapshot_and_clean_at(
        &self,
        config_dir: &Path,
        scope: &BackupScope,
        taken_at: NaiveDateTime,
    ) -> BackupReport {
        let backup_root = config_dir.join(BACKUP_DIR_NAME);
        info!(
            config_dir = %config_dir.display(),
            scope = ?scope,
            "starting selective backup"
        );
        let snapshot = match allocate_snapshot(&backup_root, taken_at) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(backup_root = %backup_root.display(), error = %err, "failed to create snapshot directory; continuing without backup");
                let mut report = BackupReport::new(snapshot_path(&backup_root, taken_at));
                report.created = false;
                return report;
            }
        };
        let mut report = BackupReport::new(snapshot.clone());
        debug!(snapshot = %snapshot.display(), "snapshot directory created");

        let entries = match in_scope_entries(config_dir, scope) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(config_dir = %config_dir.display(), error = %err, "failed to list config directory; continuing without backup");
                return report;
            }
        };

        for (name, source) in &entries {
            match copy_entry(source, &snapshot.join(name)) {
                Ok(true) => {
                    debug!(entry = %name, "entry backed up");
                    report.copied.push(name.clone());
                }
                Ok(false) => warn!(entry = %name, "special entry not carried into snapshot"),
                Err(err) => {
                    warn!(entry = %name, error = %err, "failed to back up entry");
                    report.failures.push(name.clone());
                }
            }
        }
        info!(
            snapshot = %snapshot.display(),
            copied = report.copied.len(),
            "backup completed"
        );

        let pruned = self.retention.prune(&backup_root);
        if !pruned.failed.is_empty() {
            warn!(failed = pruned.failed.len(), "some expired snapshots could not be removed");
        }
        report.pruned = pruned.removed;

        for (name, target) in &entries {
            match remove_entry(target) {
                Ok(()) => report.removed.push(name.clone()),
                Err(err) => {
                    warn!(entry = %name, error = %err, "failed to remove entry");
                    if !report.failures.contains(name) {
                        report.failures.push(name.clone());
                    }
                }
            }
        }
        info!(removed = report.removed.len(), "config directory cleaned");
        report
    }
}

/// Maximum number of later seconds tried when the snapshot name is taken.
const SNAPSHOT_NAME_ATTEMPTS: i64 = 60;

fn snapshot_path(backup_root: &Path, taken_at: NaiveDateTime) -> PathBuf {
    backup_root.join(taken_at.format(SNAPSHOT_FORMAT).to_string())
}

/// Create a fresh snapshot directory. An existing snapshot is never reused;
/// the name moves forward one second at a time until a free one is found.
fn allocate_snapshot(backup_root: &Path, taken_at: NaiveDateTime) -> io::Result<PathBuf> {
    fs::create_dir_all(backup_root)?;
    let mut candidate = taken_at;
    for _ in 0..SNAPSHOT_NAME_ATTEMPTS {
        let path = snapshot_path(backup_root, candidate);
        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                candidate += TimeDelta::seconds(1);
            }
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(io::ErrorKind::AlreadyExists, "no free snapshot name"))
}

fn in_scope_entries(config_dir: &Path, scope: &BackupScope) -> io::Result<Vec<(String, PathBuf)>> {
    let mut selected = Vec::new();
    for entry in fs::read_dir(config_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if scope.includes(&name) {
            selected.push((name, entry.path()));
        } else {
            debug!(entry = %name, "outside backup scope");
        }
    }
    selected.sort();
    Ok(selected)
}

/// Copy one top-level entry, following symlinks to their content; `Ok(false)`
/// when the target is neither a file nor a directory.
fn copy_entry(source: &Path, destination: &Path) -> FsOpsResult<bool> {
    let metadata =
        fs::metadata(source).map_err(|err| FsOpsError::io("backup.stat", source, err))?;
    if metadata.is_dir() {
        copy_tree(source, destination)?;
        Ok(true)
    } else if metadata.is_file() {
        copy_file(source, destination)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn copy_tree(source: &Path, destination: &Path) -> FsOpsResult<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry =
            entry.map_err(|source_err| FsOpsError::walkdir("copy_tree.walk", source, source_err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| FsOpsError::InvalidInput {
                field: "source_path",
                reason: "strip_prefix",
                value: Some(entry.path().to_string_lossy().into_owned()),
            })?;
        let target_path = destination.join(relative);
        let kind = entry.file_type();
        if kind.is_dir() {
            fs::create_dir_all(&target_path).map_err(|source_err| {
                FsOpsError::io("copy_tree.create_dir", &target_path, source_err)
            })?;
            let permissions = entry
                .metadata()
                .map_err(|source_err| FsOpsError::walkdir("copy_tree.stat", entry.path(), source_err))?
                .permissions();
            fs::set_permissions(&target_path, permissions).map_err(|source_err| {
                FsOpsError::io("copy_tree.set_permissions", &target_path, source_err)
            })?;
        } else if kind.is_file() {
            copy_file(entry.path(), &target_path)?;
        }
    }
    Ok(())
}

fn copy_file(source: &Path, destination: &Path) -> FsOpsResult<()> {
    let mut reader =
        File::open(source).map_err(|err| FsOpsError::io("copy_file.open", source, err))?;
    let mut writer = File::create(destination)
        .map_err(|err| FsOpsError::io("copy_file.create", destination, err))?;
    io::copy(&mut reader, &mut writer)
        .map_err(|err| FsOpsError::io("copy_file.copy", destination, err))?;
    writer
        .sync_all()
        .map_err(|err| FsOpsError::io("copy_file.sync", destination, err))
}

fn remove_entry(target: &Path) -> FsOpsResult<()> {
    let metadata = fs::symlink_metadata(target)
        .map_err(|err| FsOpsError::io("clean.stat", target, err))?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    result.map_err(|err| FsOpsError::io("clean.remove", target, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ServiceProfile;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    fn at(day: u32) -> TestResult<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .ok_or_else(|| anyhow::anyhow!("invalid test date"))
    }

    fn mihomo_dir() -> TestResult<TempDir> {
        let dir = TempDir::new()?;
        let root = dir.path();
        fs::create_dir_all(root.join("providers"))?;
        fs::write(root.join("providers/a.yaml"), "proxies: []")?;
        fs::create_dir_all(root.join("ruleset/nested"))?;
        fs::write(root.join("ruleset/nested/r.txt"), "DOMAIN,example.com")?;
        fs::write(root.join("config.yaml"), "port: 7890")?;
        fs::write(root.join("extra.txt"), "keep me")?;
        Ok(dir)
    }

    #[test]
    fn selective_backup_copies_and_removes_only_targets() -> TestResult<()> {
        let dir = mihomo_dir()?;
        let root = dir.path();
        let scope = ServiceProfile::Mihomo.backup_scope("config.yaml");

        let report = BackupManager::default().snapshot_and_clean_at(root, &scope, at(5)?);
        assert!(report.is_clean());
        assert_eq!(report.path, root.join("backup/2024-01-05_00-00-00"));
        assert_eq!(report.copied, vec!["config.yaml", "providers", "ruleset"]);
        assert_eq!(report.removed, report.copied);

        assert_eq!(fs::read_to_string(report.path.join("config.yaml"))?, "port: 7890");
        assert_eq!(
            fs::read_to_string(report.path.join("ruleset/nested/r.txt"))?,
            "DOMAIN,example.com"
        );
        assert!(!report.path.join("extra.txt").exists());

        assert_eq!(fs::read_to_string(root.join("extra.txt"))?, "keep me");
        assert!(!root.join("providers").exists());
        assert!(!root.join("ruleset").exists());
        assert!(!root.join("config.yaml").exists());
        Ok(())
    }

    #[test]
    fn whole_directory_scope_skips_backup_root() -> TestResult<()> {
        let dir = mihomo_dir()?;
        let root = dir.path();
        let manager = BackupManager::default();

        let first = manager.snapshot_and_clean_at(root, &BackupScope::Everything, at(1)?);
        assert_eq!(first.copied.len(), 4);
        fs::write(root.join("new.conf"), "v2")?;

        let second = manager.snapshot_and_clean_at(root, &BackupScope::Everything, at(2)?);
        assert_eq!(second.copied, vec!["new.conf"]);
        assert!(!second.path.join(BACKUP_DIR_NAME).exists());
        assert!(first.path.join("extra.txt").is_file());
        Ok(())
    }

    #[test]
    fn snapshot_exists_even_when_nothing_matches() -> TestResult<()> {
        let dir = TempDir::new()?;
        let scope = ServiceProfile::MosDns.backup_scope("config.yaml");
        let report = BackupManager::default().snapshot_and_clean_at(dir.path(), &scope, at(3)?);
        assert!(report.path.is_dir());
        assert!(report.copied.is_empty());
        Ok(())
    }

    #[test]
    fn each_pass_prunes_to_retention_ceiling() -> TestResult<()> {
        let dir = mihomo_dir()?;
        let root = dir.path();
        let manager = BackupManager::new(RetentionPolicy::new(2));
        let scope = ServiceProfile::Mihomo.backup_scope("config.yaml");
        for day in 1..=4 {
            fs::write(root.join("config.yaml"), format!("day {day}"))?;
            let _ = manager.snapshot_and_clean_at(root, &scope, at(day)?);
        }
        let mut snapshots: Vec<String> = fs::read_dir(root.join(BACKUP_DIR_NAME))?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<Result<_, _>>()?;
        snapshots.sort();
        assert_eq!(snapshots, vec!["2024-01-03_00-00-00", "2024-01-04_00-00-00"]);
        Ok(())
    }

    #[test]
    fn same_second_snapshots_never_share_a_directory() -> TestResult<()> {
        let dir = mihomo_dir()?;
        let root = dir.path();
        let manager = BackupManager::default();
        let scope = ServiceProfile::Mihomo.backup_scope("config.yaml");

        let first = manager.snapshot_and_clean_at(root, &scope, at(9)?);
        fs::write(root.join("config.yaml"), "written by first update")?;
        let second = manager.snapshot_and_clean_at(root, &scope, at(9)?);

        assert_ne!(first.path, second.path);
        assert_eq!(second.path, root.join("backup/2024-01-09_00-00-01"));
        assert_eq!(fs::read_to_string(first.path.join("config.yaml"))?, "port: 7890");
        assert!(first.path.join("providers/a.yaml").is_file());
        assert_eq!(
            fs::read_to_string(second.path.join("config.yaml"))?,
            "written by first update"
        );
        Ok(())
    }

    #[test]
    fn unusable_backup_root_leaves_directory_untouched() -> TestResult<()> {
        let dir = mihomo_dir()?;
        let root = dir.path();
        fs::write(root.join(BACKUP_DIR_NAME), "not a directory")?;
        let scope = ServiceProfile::Mihomo.backup_scope("config.yaml");

        let report = BackupManager::default().snapshot_and_clean_at(root, &scope, at(4)?);
        assert!(!report.created);
        assert!(report.copied.is_empty() && report.removed.is_empty());
        assert_eq!(fs::read_to_string(root.join("config.yaml"))?, "port: 7890");
        Ok(())
    }

    #[test]
    fn retention_removals_are_reported() -> TestResult<()> {
        let dir = mihomo_dir()?;
        let root = dir.path();
        let manager = BackupManager::new(RetentionPolicy::new(1));
        let scope = ServiceProfile::Mihomo.backup_scope("config.yaml");

        let first = manager.snapshot_and_clean_at(root, &scope, at(1)?);
        assert!(first.pruned.is_empty());
        let second = manager.snapshot_and_clean_at(root, &scope, at(2)?);
        assert_eq!(second.pruned, vec![first.path.clone()]);
        assert!(!first.path.exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn directory_mode_is_preserved_and_links_copied_as_content() -> TestResult<()> {
        use std::os::unix::fs::{PermissionsExt, symlink};

        let dir = TempDir::new()?;
        let root = dir.path();
        fs::create_dir_all(root.join("rules"))?;
        fs::write(root.join("rules/hosts.txt"), "127.0.0.1 a")?;
        symlink(root.join("rules/hosts.txt"), root.join("rules/link.txt"))?;
        fs::set_permissions(root.join("rules"), fs::Permissions::from_mode(0o750))?;

        let scope = ServiceProfile::MosDns.backup_scope("config.yaml");
        let report = BackupManager::default().snapshot_and_clean_at(root, &scope, at(7)?);
        let copied = report.path.join("rules");
        assert_eq!(fs::metadata(&copied)?.permissions().mode() & 0o777, 0o750);
        assert!(copied.join("hosts.txt").is_file());
        let link_copy = fs::symlink_metadata(copied.join("link.txt"))?;
        assert!(link_copy.file_type().is_file());
        assert_eq!(fs::read_to_string(copied.join("link.txt"))?, "127.0.0.1 a");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_config_file_is_backed_up_before_removal() -> TestResult<()> {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new()?;
        let root = dir.path();
        let real = TempDir::new()?;
        fs::write(real.path().join("real.yaml"), "port: 7890")?;
        symlink(real.path().join("real.yaml"), root.join("config.yaml"))?;

        let scope = ServiceProfile::Mihomo.backup_scope("config.yaml");
        let report = BackupManager::default().snapshot_and_clean_at(root, &scope, at(8)?);

        assert_eq!(report.copied, vec!["config.yaml"]);
        assert_eq!(report.removed, vec!["config.yaml"]);
        assert!(report.is_clean());
        let saved = report.path.join("config.yaml");
        assert!(fs::symlink_metadata(&saved)?.file_type().is_file());
        assert_eq!(fs::read_to_string(saved)?, "port: 7890");
        assert_eq!(fs::read_to_string(real.path().join("real.yaml"))?, "port: 7890");
        Ok(())
    }
}
