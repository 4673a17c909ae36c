//! Directory and literal-file materialisation under the config directory.

use std::fs::{DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use configflow_core::{CustomFile, resolve_under};
use tracing::{debug, info};

use crate::error::{FsOpsError, FsOpsResult};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Cache file the DNS filter expects to find at start-up.
pub const CACHE_DUMP_FILE: &str = "cache.dump";

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Create an empty [`CACHE_DUMP_FILE`] in `config_dir` when missing.
///
/// Returns whether the file was created.
///
/// # Errors
///
/// Returns an error if the file cannot be created or its mode cannot be set.
pub fn ensure_cache_dump(config_dir: &Path) -> FsOpsResult<bool> {
    let path = config_dir.join(CACHE_DUMP_FILE);
    if path.exists() {
        debug!(path = %path.display(), "cache dump already present");
        return Ok(false);
    }
    write_with_mode(&path, b"")?;
    info!(path = %path.display(), "created empty cache dump");
    Ok(true)
}

/// Ensure every requested directory exists, resolving relative entries under
/// `config_dir`. Stops at the first failure.
///
/// # Errors
///
/// Returns the first directory creation failure.
pub fn create_directories(config_dir: &Path, directories: &[String]) -> FsOpsResult<Vec<PathBuf>> {
    let mut created = Vec::with_capacity(directories.len());
    for requested in directories {
        let path = resolve_under(config_dir, requested);
        create_dir(&path)?;
        debug!(path = %path.display(), requested = %requested, "directory ensured");
        created.push(path);
    }
    Ok(created)
}

/// Write each custom file verbatim, creating parent directories as needed.
/// Stops at the first failure.
///
/// # Errors
///
/// Returns the first directory or write failure.
pub fn write_custom_files(config_dir: &Path, files: &[CustomFile]) -> FsOpsResult<usize> {
    for file in files {
        let path = resolve_under(config_dir, &file.path);
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        write_with_mode(&path, file.content.as_bytes())?;
        debug!(path = %path.display(), bytes = file.content.len(), "custom file written");
    }
    info!(count = files.len(), "custom files written");
    Ok(files.len())
}

fn create_dir(path: &Path) -> FsOpsResult<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder
        .create(path)
        .map_err(|err| FsOpsError::io("materialize.create_dir", path, err))
}

fn write_with_mode(path: &Path, bytes: &[u8]) -> FsOpsResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);
    let mut file = options
        .open(path)
        .map_err(|err| FsOpsError::io("materialize.open", path, err))?;
    file.write_all(bytes)
        .map_err(|err| FsOpsError::io("materialize.write", path, err))?;
    #[cfg(unix)]
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE))
        .map_err(|err| FsOpsError::io("materialize.set_permissions", path, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    type TestResult<T> = anyhow::Result<T>;

    #[test]
    fn cache_dump_is_created_once() -> TestResult<()> {
        let dir = TempDir::new()?;
        assert!(ensure_cache_dump(dir.path())?);
        fs::write(dir.path().join(CACHE_DUMP_FILE), b"warm")?;
        assert!(!ensure_cache_dump(dir.path())?);
        assert_eq!(fs::read(dir.path().join(CACHE_DUMP_FILE))?, b"warm");
        Ok(())
    }

    #[test]
    fn directories_resolve_relative_and_absolute() -> TestResult<()> {
        let dir = TempDir::new()?;
        let absolute = dir.path().join("elsewhere/deep");
        let created = create_directories(
            dir.path(),
            &["rules/geo".to_string(), absolute.to_string_lossy().into_owned()],
        )?;
        assert_eq!(created, vec![dir.path().join("rules/geo"), absolute.clone()]);
        assert!(dir.path().join("rules/geo").is_dir());
        assert!(absolute.is_dir());
        Ok(())
    }

    #[test]
    fn directory_under_a_file_fails() -> TestResult<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("extra.txt"), "file")?;
        let err = create_directories(dir.path(), &["extra.txt/sub".to_string()]);
        assert!(matches!(
            err,
            Err(FsOpsError::Io {
                operation: "materialize.create_dir",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn custom_files_strip_dot_prefix_and_create_parents() -> TestResult<()> {
        let dir = TempDir::new()?;
        let files = vec![
            CustomFile {
                path: "./rules/custom_hosts.txt".to_string(),
                content: "127.0.0.1 router.lan".to_string(),
            },
            CustomFile {
                path: "whitelist.txt".to_string(),
                content: "example.org".to_string(),
            },
        ];
        assert_eq!(write_custom_files(dir.path(), &files)?, 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("rules/custom_hosts.txt"))?,
            "127.0.0.1 router.lan"
        );
        assert_eq!(fs::read_to_string(dir.path().join("whitelist.txt"))?, "example.org");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn written_files_use_fixed_modes() -> TestResult<()> {
        let dir = TempDir::new()?;
        let files = vec![CustomFile {
            path: "rules/a.txt".to_string(),
            content: "a".to_string(),
        }];
        write_custom_files(dir.path(), &files)?;
        let mode = fs::metadata(dir.path().join("rules/a.txt"))?.permissions().mode() & 0o777;
        assert_eq!(mode, FILE_MODE);
        Ok(())
    }
}
