//! A durable, segmented write-ahead log for a small time-series store.
//!
//! The WAL is append-only, single-writer, and crash-recoverable: every
//! accepted request is assigned a monotonically increasing request
//! number, written to a binary log segment, and periodically indexed by
//! a human-readable checkpoint file and a small binary bookmark. On
//! restart the WAL truncates any partial trailing entry and can replay
//! everything past the last durable commit.
//!
//! All mutation happens on one background thread (the actor,
//! [`actor::Actor`]); callers talk to it through [`Wal`], which is safe
//! to share across threads behind an `Arc`.
//!
//! This crate deliberately does not implement replication, multi-writer
//! coordination, compression, encryption, pluggable codecs, or
//! per-entry checksums beyond the structural validation tail-truncation
//! already performs.

#![warn(missing_docs)]

mod actor;
mod bookmark;
mod checkpoint;
mod config;
mod discovery;
mod entry;
mod error;
mod recovery;
mod segment;
mod wal;

pub use bookmark::BookmarkSnapshot;
pub use config::{WalConfig, WalConfigError};
pub use error::{Result, WalError};
pub use wal::Wal;

pub use tsdb_wal_core::{Request, WalCoreError};
