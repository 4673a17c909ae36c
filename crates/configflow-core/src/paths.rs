//! Path resolution shared by every materialisation stage.

use std::path::{Path, PathBuf};

/// Resolve `candidate` against `base` unless it is already absolute.
///
/// A leading `./` (or `.\`) is dropped before joining so controller-supplied
/// paths such as `./rules/hosts.txt` land directly under `base`.
#[must_use]
pub fn resolve_under(base: &Path, candidate: &str) -> PathBuf {
    let path = Path::new(candidate);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let trimmed = candidate
        .strip_prefix("./")
        .or_else(|| candidate.strip_prefix(".\\"))
        .unwrap_or(candidate);
    base.join(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_kept() {
        let resolved = resolve_under(Path::new("/etc/mosdns"), "/var/lib/rules.txt");
        assert_eq!(resolved, PathBuf::from("/var/lib/rules.txt"));
    }

    #[test]
    fn relative_paths_join_the_base() {
        let base = Path::new("/etc/mihomo");
        assert_eq!(
            resolve_under(base, "providers/a.yaml"),
            PathBuf::from("/etc/mihomo/providers/a.yaml")
        );
        assert_eq!(
            resolve_under(base, "./rules/hosts.txt"),
            PathBuf::from("/etc/mihomo/rules/hosts.txt")
        );
        assert_eq!(
            resolve_under(base, ".\\rules.txt"),
            PathBuf::from("/etc/mihomo/rules.txt")
        );
    }
}
