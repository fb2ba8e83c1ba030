//! Segment discovery: listing a WAL directory and pairing up `log.<N>` /
//! `checkpoint.<N>` files on open.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, WalError};

/// One discovered `log.<N>` / `checkpoint.<N>` pair, not yet opened.
#[derive(Debug, Clone)]
pub struct DiscoveredPair {
    /// The shared numeric suffix.
    pub suffix: i32,
    /// Path to `log.<suffix>`.
    pub log_path: PathBuf,
    /// Path to `checkpoint.<suffix>`.
    pub checkpoint_path: PathBuf,
}

/// The path a segment with `suffix` would have in `directory`.
pub fn log_path(directory: &Path, suffix: i32) -> PathBuf {
    directory.join(format!("log.{suffix}"))
}

/// The path a checkpoint with `suffix` would have in `directory`.
pub fn checkpoint_path(directory: &Path, suffix: i32) -> PathBuf {
    directory.join(format!("checkpoint.{suffix}"))
}

/// List `directory` and pair every `log.<N>` with its `checkpoint.<N>`.
///
/// Entries matching neither pattern are ignored with a warning. A suffix
/// present on only one side is an [`WalError::OrphanSegment`]. The
/// returned pairs are sorted ascending by suffix; the last is the
/// active pair.
pub fn discover(directory: &Path) -> Result<Vec<DiscoveredPair>> {
    let mut logs: BTreeMap<i32, PathBuf> = BTreeMap::new();
    let mut checkpoints: BTreeMap<i32, PathBuf> = BTreeMap::new();

    let entries = fs::read_dir(directory).map_err(|e| WalError::io(directory, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| WalError::io(directory, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "skipping non-UTF8 directory entry");
            continue;
        };

        if let Some(suffix) = parse_suffix(name, "log.") {
            logs.insert(suffix, path);
        } else if let Some(suffix) = parse_suffix(name, "checkpoint.") {
            checkpoints.insert(suffix, path);
        } else {
            warn!(path = %path.display(), "ignoring unrecognized file during segment discovery");
        }
    }

    for suffix in logs.keys() {
        if !checkpoints.contains_key(suffix) {
            return Err(WalError::OrphanSegment {
                suffix: *suffix,
                detail: "log.<N> with no matching checkpoint.<N>".to_string(),
            });
        }
    }
    for suffix in checkpoints.keys() {
        if !logs.contains_key(suffix) {
            return Err(WalError::OrphanSegment {
                suffix: *suffix,
                detail: "checkpoint.<N> with no matching log.<N>".to_string(),
            });
        }
    }

    // BTreeMap iterates in ascending key order already.
    Ok(logs
        .into_iter()
        .map(|(suffix, log_path)| DiscoveredPair {
            suffix,
            log_path,
            checkpoint_path: checkpoints.remove(&suffix).expect("paired above"),
        })
        .collect())
}

fn parse_suffix(name: &str, prefix: &str) -> Option<i32> {
    name.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn empty_directory_has_no_pairs() {
        let dir = tempdir().unwrap();
        assert!(discover(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn pairs_are_sorted_ascending_by_suffix() {
        let dir = tempdir().unwrap();
        for suffix in [3, 1, 2] {
            touch(&log_path(dir.path(), suffix));
            touch(&checkpoint_path(dir.path(), suffix));
        }

        let pairs = discover(dir.path()).unwrap();
        let suffixes: Vec<i32> = pairs.iter().map(|p| p.suffix).collect();
        assert_eq!(suffixes, vec![1, 2, 3]);
    }

    #[test]
    fn unrecognized_file_is_ignored() {
        let dir = tempdir().unwrap();
        touch(&log_path(dir.path(), 1));
        touch(&checkpoint_path(dir.path(), 1));
        touch(&dir.path().join("README.md"));

        let pairs = discover(dir.path()).unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn log_without_checkpoint_is_orphan() {
        let dir = tempdir().unwrap();
        touch(&log_path(dir.path(), 1));

        let err = discover(dir.path()).unwrap_err();
        assert!(matches!(err, WalError::OrphanSegment { suffix: 1, .. }));
    }

    #[test]
    fn checkpoint_without_log_is_orphan() {
        let dir = tempdir().unwrap();
        touch(&checkpoint_path(dir.path(), 1));

        let err = discover(dir.path()).unwrap_err();
        assert!(matches!(err, WalError::OrphanSegment { suffix: 1, .. }));
    }
}
