//! Bookmark: the fixed-size state file holding the WAL's four durable
//! counters, rewritten atomically via write-to-temp-then-rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, WalError};

/// Size in bytes of the on-disk bookmark record.
const RECORD_SIZE: usize = 4 + 4 + 8 + 4;

/// The WAL's durable counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    current_request_num: u32,
    current_file_num: i32,
    current_file_offset: i64,
    current_commit_num: u32,
}

impl Bookmark {
    fn zero() -> Self {
        Bookmark {
            current_request_num: 0,
            current_file_num: 0,
            current_file_offset: 0,
            current_commit_num: 0,
        }
    }

    /// Load the bookmark at `path`. A missing file yields a
    /// zero-initialized bookmark (a fresh WAL).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::zero()),
            Err(e) => return Err(WalError::io(path, e)),
        };

        if bytes.len() < RECORD_SIZE {
            return Err(WalError::ShortBookmark {
                path: path.to_path_buf(),
                expected: RECORD_SIZE,
                actual: bytes.len(),
            });
        }

        let current_request_num = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let current_file_num = i32::from_be_bytes(bytes[4..8].try_into().unwrap());
        let current_file_offset = i64::from_be_bytes(bytes[8..16].try_into().unwrap());
        let current_commit_num = u32::from_be_bytes(bytes[16..20].try_into().unwrap());

        Ok(Bookmark {
            current_request_num,
            current_file_num,
            current_file_offset,
            current_commit_num,
        })
    }

    /// Atomically rewrite the bookmark at `path`: write to `<path>.new`,
    /// fsync it, close it, then rename over `path`. The rename is the
    /// commit point — a reader sees either the old or the new file, never
    /// a torn one.
    pub fn sync(&self, path: &Path) -> Result<()> {
        let tmp_path = tmp_path(path);
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| WalError::io(&tmp_path, e))?;
            tmp.write_all(&self.to_bytes())
                .map_err(|e| WalError::io(&tmp_path, e))?;
            tmp.sync_all().map_err(|e| WalError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| WalError::io(path, e))?;
        Ok(())
    }

    fn to_bytes(self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.current_request_num.to_be_bytes());
        buf[4..8].copy_from_slice(&self.current_file_num.to_be_bytes());
        buf[8..16].copy_from_slice(&self.current_file_offset.to_be_bytes());
        buf[16..20].copy_from_slice(&self.current_commit_num.to_be_bytes());
        buf
    }

    /// Pre-increment and return the next request number. The first
    /// value ever returned is 1.
    pub fn next_request_num(&mut self) -> u32 {
        self.current_request_num += 1;
        self.current_request_num
    }

    /// Pre-increment and return the next segment suffix.
    pub fn next_file_num(&mut self) -> i32 {
        self.current_file_num += 1;
        self.current_file_num
    }

    /// Advance the durable commit watermark. Does not sync.
    pub fn commit(&mut self, request_num: u32) {
        self.current_commit_num = request_num;
    }

    /// Current request number (last assigned, 0 if none yet).
    pub fn current_request_num(&self) -> u32 {
        self.current_request_num
    }

    /// Current active segment suffix.
    pub fn current_file_num(&self) -> i32 {
        self.current_file_num
    }

    /// Current write offset within the active segment.
    pub fn current_file_offset(&self) -> i64 {
        self.current_file_offset
    }

    /// Record the active segment's write offset.
    pub fn set_current_file_offset(&mut self, offset: i64) {
        self.current_file_offset = offset;
    }

    /// Highest request number the caller has confirmed as applied
    /// downstream.
    pub fn current_commit_num(&self) -> u32 {
        self.current_commit_num
    }

    /// A point-in-time copy of all four counters.
    pub fn snapshot(&self) -> BookmarkSnapshot {
        BookmarkSnapshot {
            current_request_num: self.current_request_num,
            current_file_num: self.current_file_num,
            current_file_offset: self.current_file_offset,
            current_commit_num: self.current_commit_num,
        }
    }
}

/// A point-in-time view of the WAL's four durable counters, returned by
/// [`crate::Wal::bookmark_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookmarkSnapshot {
    /// Last request number assigned.
    pub current_request_num: u32,
    /// Suffix of the active segment.
    pub current_file_num: i32,
    /// Write offset within the active segment.
    pub current_file_offset: i64,
    /// Highest request number the caller has confirmed as applied.
    pub current_commit_num: u32,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".new");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_as_zero() {
        let dir = tempdir().unwrap();
        let bookmark = Bookmark::load(&dir.path().join("bookmark")).unwrap();
        assert_eq!(bookmark.current_request_num(), 0);
        assert_eq!(bookmark.current_commit_num(), 0);
    }

    #[test]
    fn next_request_num_is_pre_increment_starting_at_one() {
        let mut bookmark = Bookmark::zero();
        assert_eq!(bookmark.next_request_num(), 1);
        assert_eq!(bookmark.next_request_num(), 2);
        assert_eq!(bookmark.current_request_num(), 2);
    }

    #[test]
    fn sync_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bookmark");

        let mut bookmark = Bookmark::zero();
        bookmark.next_request_num();
        bookmark.next_request_num();
        bookmark.next_file_num();
        bookmark.set_current_file_offset(4096);
        bookmark.commit(2);
        bookmark.sync(&path).unwrap();

        let reloaded = Bookmark::load(&path).unwrap();
        assert_eq!(reloaded, bookmark);
    }

    #[test]
    fn sync_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bookmark");
        Bookmark::zero().sync(&path).unwrap();
        assert!(!tmp_path(&path).exists());
        assert!(path.exists());
    }

    #[test]
    fn short_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bookmark");
        fs::write(&path, [0u8; 5]).unwrap();
        assert!(matches!(
            Bookmark::load(&path),
            Err(WalError::ShortBookmark { .. })
        ));
    }
}
