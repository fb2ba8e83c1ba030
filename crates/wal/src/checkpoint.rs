//! Checkpoint file: a coarse, human-readable index into a sibling log
//! segment.
//!
//! Each line is one record: `<req_start>.<first_offset>.<req_end>.<last_offset>\n`,
//! all decimal. The file is plain ASCII on purpose so that a truncated
//! last line (a crash mid-append) can be detected and ignored instead of
//! failing the whole file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, WalError};

/// One checkpoint record: request numbers `[req_start, req_end]` lie in
/// the sibling log segment between byte `first_offset` and `last_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointRecord {
    /// First request number covered by this record.
    pub req_start: u32,
    /// Last request number covered by this record.
    pub req_end: u32,
    /// Byte offset in the sibling log where this range starts.
    pub first_offset: i64,
    /// Byte offset in the sibling log where this range ends.
    pub last_offset: i64,
}

impl CheckpointRecord {
    fn format_line(&self) -> String {
        format!(
            "{}.{}.{}.{}\n",
            self.req_start, self.first_offset, self.req_end, self.last_offset
        )
    }

    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split('.');
        let req_start = fields.next()?.parse().ok()?;
        let first_offset = fields.next()?.parse().ok()?;
        let req_end = fields.next()?.parse().ok()?;
        let last_offset = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(CheckpointRecord {
            req_start,
            req_end,
            first_offset,
            last_offset,
        })
    }
}

/// Checkpoint file backing one `checkpoint.<suffix>` file.
pub struct CheckpointFile {
    file: File,
    path: PathBuf,
    suffix: i32,
    records: Vec<CheckpointRecord>,
}

impl CheckpointFile {
    /// Open `path`, creating it if missing, and parse every complete
    /// line into memory in order.
    ///
    /// A non-final line that does not split into exactly four decimal
    /// fields fails the open with [`WalError::CorruptCheckpoint`]. A
    /// short final line (no trailing newline, left by a crash mid
    /// append) is silently dropped.
    pub fn open(path: impl Into<PathBuf>, suffix: i32) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| WalError::io(&path, e))?;

        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| WalError::io(&path, e))?;

        let records = parse_lines(&text, &path)?;

        file.seek_to_end(&path)?;

        Ok(CheckpointFile {
            file,
            path,
            suffix,
            records,
        })
    }

    /// This checkpoint's numeric suffix (matches its sibling log).
    pub fn suffix(&self) -> i32 {
        self.suffix
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records currently held in memory, in append order.
    pub fn records(&self) -> &[CheckpointRecord] {
        &self.records
    }

    /// Append one record as a new line and remember it in memory.
    pub fn append(&mut self, record: CheckpointRecord) -> Result<()> {
        self.file
            .write_all(record.format_line().as_bytes())
            .map_err(|e| WalError::io(&self.path, e))?;
        self.records.push(record);
        Ok(())
    }

    /// Offset at which the next, not-yet-indexed entry begins: the
    /// `last_offset` of the last record, or 0 if this file is empty.
    pub fn last_offset(&self) -> i64 {
        self.records.last().map(|r| r.last_offset).unwrap_or(0)
    }

    /// The `first_offset` of the smallest record whose `req_end >=
    /// req_num`, or `None` if `req_num` falls outside this file's
    /// covered range.
    pub fn offset_for(&self, req_num: u32) -> Option<i64> {
        if self.records.is_empty() {
            return None;
        }
        if req_num < self.records.first().unwrap().req_start
            || req_num > self.records.last().unwrap().req_end
        {
            return None;
        }
        let idx = self
            .records
            .partition_point(|r| r.req_end < req_num);
        self.records.get(idx).map(|r| r.first_offset)
    }

    /// Flush OS buffers to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().map_err(|e| WalError::io(&self.path, e))
    }

    /// Close the checkpoint, syncing first.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    /// Close and delete the backing file.
    pub fn delete(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(&path).map_err(|e| WalError::io(&path, e))
    }
}

fn parse_lines(text: &str, path: &Path) -> Result<Vec<CheckpointRecord>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let ends_with_newline = text.ends_with('\n');
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    let mut records = Vec::with_capacity(lines.len());
    let last_idx = lines.len().saturating_sub(1);
    for (i, line) in lines.iter().enumerate() {
        match CheckpointRecord::parse(line) {
            Some(record) => records.push(record),
            None => {
                if i == last_idx && !ends_with_newline {
                    // Crash mid-append: the final line never got its
                    // trailing newline. Treat as EOF, not corruption.
                    break;
                }
                return Err(WalError::CorruptCheckpoint {
                    path: path.to_path_buf(),
                    line_number: i + 1,
                    detail: format!("expected 4 decimal fields, got {line:?}"),
                });
            }
        }
    }
    Ok(records)
}

trait SeekToEnd {
    fn seek_to_end(&mut self, path: &Path) -> Result<()>;
}

impl SeekToEnd for File {
    fn seek_to_end(&mut self, path: &Path) -> Result<()> {
        use std::io::{Seek, SeekFrom};
        self.seek(SeekFrom::End(0))
            .map_err(|e| WalError::io(path, e))?;
        Ok(())
    }
}
