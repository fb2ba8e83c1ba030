//! Log segment: an append-only binary file of length-prefixed entries.
//!
//! A segment has no file-level header — it is simply entries back to
//! back starting at byte 0. Tail validation on open handles a crash
//! mid-write by truncating any partial trailing entry (I4).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::entry::{EntryHeader, HEADER_SIZE};
use crate::error::{Result, WalError};

/// Append-only log segment backing one `log.<suffix>` file.
pub struct LogSegment {
    file: File,
    path: PathBuf,
    suffix: i32,
    offset: u64,
}

impl LogSegment {
    /// Open `path` for append+read, creating it if missing.
    ///
    /// Runs tail validation: truncates any entry whose header or body
    /// was not fully written (a crash mid-append).
    pub fn open(path: impl Into<PathBuf>, suffix: i32) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| WalError::io(&path, e))?;

        let valid_end = validate_tail(&mut file, &path)?;
        let total_len = file.metadata().map_err(|e| WalError::io(&path, e))?.len();
        if valid_end < total_len {
            warn!(
                path = %path.display(),
                valid_end,
                discarded_bytes = total_len - valid_end,
                "truncating partial entry at log tail"
            );
            file.set_len(valid_end).map_err(|e| WalError::io(&path, e))?;
        }
        file.seek(SeekFrom::Start(valid_end))
            .map_err(|e| WalError::io(&path, e))?;

        Ok(LogSegment {
            file,
            path,
            suffix,
            offset: valid_end,
        })
    }

    /// This segment's numeric suffix.
    pub fn suffix(&self) -> i32 {
        self.suffix
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current byte length / write offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Append one entry: an 8-byte header followed by `body`.
    ///
    /// On failure the segment re-synchronizes its notion of `offset()`
    /// to the file's real length so the caller can observe exactly how
    /// much (if anything) made it to disk; it does not attempt to roll
    /// the partial write back.
    pub fn append(&mut self, request_num: u32, body: &[u8]) -> Result<()> {
        let header = EntryHeader {
            request_num,
            body_length: body.len() as u32,
        };

        let write_result = (|| -> std::io::Result<()> {
            header.write_to(&mut self.file)?;
            self.file.write_all(body)
        })();

        if let Ok(pos) = self.file.seek(SeekFrom::Current(0)) {
            self.offset = pos;
        }

        write_result.map_err(|e| WalError::io(&self.path, e))
    }

    /// Flush OS buffers to disk for this segment.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().map_err(|e| WalError::io(&self.path, e))
    }

    /// Produce a lazy, single-pass sequence of requests from this
    /// segment: seek to `start_offset` (or the start of the segment if
    /// `-1`), skip entries whose `request_num < min_req_num`, then yield
    /// every subsequent entry in order.
    pub fn replay(&self, start_offset: i64, min_req_num: u32) -> Result<Replay> {
        let mut file = File::open(&self.path).map_err(|e| WalError::io(&self.path, e))?;
        let start = if start_offset < 0 {
            0
        } else {
            start_offset as u64
        };
        file.seek(SeekFrom::Start(start))
            .map_err(|e| WalError::io(&self.path, e))?;
        skip_to_request_num(&mut file, &self.path, min_req_num)?;

        Ok(Replay {
            file,
            path: self.path.clone(),
            stop: StopSignal::new(),
            done: false,
        })
    }

    /// Close the segment, syncing first.
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

/// Walk entry headers from the start of `file`, seeking forward by each
/// entry's body length, and return the offset immediately after the
/// last fully-present entry. Any header read that is short, or any body
/// that would extend past EOF, stops the scan at the offset where that
/// entry started.
fn validate_tail(file: &mut File, path: &Path) -> Result<u64> {
    let total_len = file.metadata().map_err(|e| WalError::io(path, e))?.len();
    file.seek(SeekFrom::Start(0)).map_err(|e| WalError::io(path, e))?;

    let mut offset = 0u64;
    loop {
        if offset == total_len {
            break;
        }
        if offset + HEADER_SIZE > total_len {
            break;
        }
        let header = match EntryHeader::read_from(file).map_err(|e| WalError::io(path, e))? {
            Some(h) => h,
            None => break,
        };
        let body_end = offset + HEADER_SIZE + header.body_length as u64;
        if body_end > total_len {
            break;
        }
        file.seek(SeekFrom::Start(body_end))
            .map_err(|e| WalError::io(path, e))?;
        offset = body_end;
    }
    Ok(offset)
}

/// Read entry headers one at a time, seeking past each body, until the
/// first header with `request_num >= min_req_num` is found; seek back
/// to the start of that header so the next read yields it.
fn skip_to_request_num(file: &mut File, path: &Path, min_req_num: u32) -> Result<()> {
    loop {
        let header_start = file
            .seek(SeekFrom::Current(0))
            .map_err(|e| WalError::io(path, e))?;
        let header = match EntryHeader::read_from(file).map_err(|e| WalError::io(path, e))? {
            Some(h) => h,
            None => return Ok(()),
        };
        if header.request_num >= min_req_num {
            file.seek(SeekFrom::Start(header_start))
                .map_err(|e| WalError::io(path, e))?;
            return Ok(());
        }
        file.seek(SeekFrom::Current(header.body_length as i64))
            .map_err(|e| WalError::io(path, e))?;
    }
}

/// A shared, cloneable flag that lets a replay consumer ask the
/// producer to stop between entries.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a fresh, unset stop signal.
    pub fn new() -> Self {
        StopSignal(Arc::new(AtomicBool::new(false)))
    }

    /// Request that the associated replay stop before its next entry.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lazy, single-pass sequence of raw `(request_num, body)` entries
/// produced by [`LogSegment::replay`].
pub struct Replay {
    file: File,
    path: PathBuf,
    stop: StopSignal,
    done: bool,
}

impl Replay {
    /// A handle the consumer can use to cooperatively cancel this
    /// replay between entries.
    pub fn stop_handle(&self) -> StopSignal {
        self.stop.clone()
    }
}

impl Iterator for Replay {
    type Item = Result<(u32, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.stop.is_stopped() {
            return None;
        }

        let header = match EntryHeader::read_from(&mut self.file) {
            Ok(Some(h)) => h,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(WalError::io(&self.path, e)));
            }
        };

        let mut body = vec![0u8; header.body_length as usize];
        if let Err(e) = self.file.read_exact(&mut body) {
            self.done = true;
            return Some(Err(WalError::io(&self.path, e)));
        }

        Some(Ok((header.request_num, body)))
    }
}
