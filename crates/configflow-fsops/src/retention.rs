//! Pruning of timestamp-named backup snapshots.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

/// Snapshot directory name format (seconds resolution, sorts chronologically).
pub const SNAPSHOT_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Number of snapshots kept after each backup.
pub const MAX_BACKUPS: usize = 3;

/// Keeps the most recent `max_kept` snapshots under a backup root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_kept: usize,
}

/// Outcome of a prune pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Snapshot directories deleted.
    pub removed: Vec<PathBuf>,
    /// Snapshot directories that should have been deleted but could not be.
    pub failed: Vec<PathBuf>,
    /// Conforming snapshots remaining.
    pub retained: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(MAX_BACKUPS)
    }
}

impl RetentionPolicy {
    /// Policy keeping `max_kept` snapshots.
    #[must_use]
    pub const fn new(max_kept: usize) -> Self {
        Self { max_kept }
    }

    /// Configured ceiling.
    #[must_use]
    pub const fn max_kept(&self) -> usize {
        self.max_kept
    }

    /// Delete the oldest snapshots under `backup_root` beyond the ceiling.
    ///
    /// Only immediate subdirectories whose name parses as [`SNAPSHOT_FORMAT`]
    /// are considered; everything else is left alone. Failures are logged and
    /// reported, never raised.
    #[must_use]
    pub fn prune(&self, backup_root: &Path) -> PruneReport {
        let mut report = PruneReport::default();
        let entries = match fs::read_dir(backup_root) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(root = %backup_root.display(), error = %err, "backup root unreadable; nothing to prune");
                return report;
            }
        };

        let mut snapshots: Vec<(NaiveDateTime, String)> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let taken_at = NaiveDateTime::parse_from_str(&name, SNAPSHOT_FORMAT).ok()?;
                Some((taken_at, name))
            })
            .collect();
        snapshots.sort();

        let excess = snapshots.len().saturating_sub(self.max_kept);
        if excess == 0 {
            report.retained = snapshots.len();
            debug!(count = snapshots.len(), max_kept = self.max_kept, "no snapshots to prune");
            return report;
        }

        info!(
            count = snapshots.len(),
            max_kept = self.max_kept,
            deleting = excess,
            "pruning old backup snapshots"
        );
        for (_, name) in snapshots.iter().take(excess) {
            let path = backup_root.join(name);
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "snapshot removed");
                    report.removed.push(path);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to remove snapshot");
                    report.failed.push(path);
                }
            }
        }
        report.retained = snapshots.len() - report.removed.len();
        report
    }
}
