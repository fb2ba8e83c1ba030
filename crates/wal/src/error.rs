use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tsdb_wal_core::WalCoreError;

use crate::config::WalConfigError;

/// Errors surfaced by the WAL to its callers.
#[derive(Debug, Error)]
pub enum WalError {
    /// Underlying I/O failure (open, read, write, fsync, rename, ...).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the failing operation was acting on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A checkpoint line did not split into exactly four decimal fields.
    #[error("corrupt checkpoint file {path}: line {line_number}: {detail}")]
    CorruptCheckpoint {
        /// Checkpoint file path.
        path: PathBuf,
        /// 1-based line number of the offending line.
        line_number: usize,
        /// What was wrong with the line.
        detail: String,
    },

    /// A `log.<N>` file was found with no matching `checkpoint.<N>`, or
    /// vice versa.
    #[error("orphan segment suffix {suffix}: {detail}")]
    OrphanSegment {
        /// The suffix with a missing sibling.
        suffix: i32,
        /// Which side was missing.
        detail: String,
    },

    /// The bookmark file exists but is shorter than its fixed record size.
    #[error("bookmark file {path} is truncated: expected {expected} bytes, got {actual}")]
    ShortBookmark {
        /// Bookmark path.
        path: PathBuf,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length read.
        actual: usize,
    },

    /// Configuration failed validation.
    #[error("invalid WAL configuration: {0}")]
    Config(#[from] WalConfigError),

    /// The caller's request codec failed.
    #[error("request codec error: {0}")]
    Codec(#[from] WalCoreError),

    /// The caller's `apply` callback returned an error during recovery.
    #[error("apply failed during recovery: {0}")]
    Apply(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The actor thread is gone (panicked or already shut down) and the
    /// caller's request could not be delivered or answered.
    #[error("WAL actor is not running")]
    ActorGone,

    /// No retained checkpoint covers `current_commit_num`, so recovery
    /// has no segment to start replay from.
    #[error("no retained segment covers commit number {commit_num}")]
    RecoveryStartNotFound {
        /// The commit number recovery tried to locate.
        commit_num: u32,
    },
}

impl WalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WalError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, WalError>;
