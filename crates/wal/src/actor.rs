//! The WAL actor: the single point of mutation.
//!
//! One dedicated thread owns every segment, the checkpoint index, and
//! the bookmark. Callers never touch these directly — they send
//! [`Command`] messages over a bounded channel and block on a private
//! reply channel. This gives append ordering and mutual exclusion for
//! free, with no locks inside the WAL itself.

use std::error::Error as StdError;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{error, info};
use tsdb_wal_core::WalCoreError;

use crate::bookmark::{Bookmark, BookmarkSnapshot};
use crate::checkpoint::{CheckpointFile, CheckpointRecord};
use crate::config::WalConfig;
use crate::discovery;
use crate::error::{Result, WalError};
use crate::recovery;
use crate::segment::LogSegment;

/// A log segment and its sibling checkpoint, kept together since they
/// always move in lockstep (opened, rotated, reaped as a pair).
pub(crate) struct SegmentPair {
    pub(crate) log: LogSegment,
    pub(crate) checkpoint: CheckpointFile,
}

type EncodeFn = Box<dyn FnOnce(u32) -> std::result::Result<Vec<u8>, WalCoreError> + Send>;
type ApplyFn =
    Box<dyn FnMut(u32, Vec<u8>) -> std::result::Result<(), Box<dyn StdError + Send + Sync>> + Send>;

/// Messages the actor accepts. Every variant carries its own one-shot
/// reply channel.
pub(crate) enum Command {
    /// Assign the next request number, encode the caller's request with
    /// it, and append it to the active segment.
    Append {
        encode: EncodeFn,
        reply: Sender<Result<u32>>,
    },
    /// Advance the in-memory commit watermark. Does not sync.
    Commit {
        request_num: u32,
        reply: Sender<Result<()>>,
    },
    /// Replay every entry past the durable commit watermark through
    /// `apply`. Must be the first command processed after open.
    Recover { apply: ApplyFn, reply: Sender<Result<()>> },
    /// Read back the current bookmark counters.
    Snapshot { reply: Sender<Result<BookmarkSnapshot>> },
    /// Graceful shutdown. `sync` forces a final checkpoint, bookmark
    /// sync, and fsync of the active segment pair before replying.
    Close { sync: bool, reply: Sender<Result<()>> },
}

/// Owns every mutable piece of WAL state. Constructed synchronously (so
/// `open()` can fail the caller immediately on a bad directory), then
/// handed off to its own thread by [`spawn`].
pub(crate) struct Actor {
    directory: PathBuf,
    bookmark_path: PathBuf,
    config: WalConfig,
    state: Bookmark,
    segments: Vec<SegmentPair>,
    since_last_checkpoint: u32,
    since_last_bookmark: u32,
    since_last_rotation: u32,
    last_checkpoint_tick: Instant,
    last_reap_tick: Instant,
}

impl Actor {
    /// Create `config.directory` if missing, load the bookmark, and
    /// discover + open every `log.<N>`/`checkpoint.<N>` pair, validating
    /// each segment's tail.
    pub(crate) fn new(config: WalConfig) -> Result<Self> {
        fs::create_dir_all(&config.directory).map_err(|e| WalError::io(&config.directory, e))?;

        let bookmark_path = config.directory.join("bookmark");
        let state = Bookmark::load(&bookmark_path)?;

        let discovered = discovery::discover(&config.directory)?;
        let mut segments = Vec::with_capacity(discovered.len());
        for pair in discovered {
            let log = LogSegment::open(&pair.log_path, pair.suffix)?;
            let checkpoint = CheckpointFile::open(&pair.checkpoint_path, pair.suffix)?;
            segments.push(SegmentPair { log, checkpoint });
        }

        let now = Instant::now();
        Ok(Actor {
            directory: config.directory.clone(),
            bookmark_path,
            config,
            state,
            segments,
            since_last_checkpoint: 0,
            since_last_bookmark: 0,
            since_last_rotation: 0,
            last_checkpoint_tick: now,
            last_reap_tick: now,
        })
    }

    fn channel_capacity(&self) -> usize {
        self.config.channel_capacity
    }

    /// The main loop: block for the next message up to the shorter of
    /// the checkpoint/reap tick periods, dispatch it, and repeat until
    /// `Close` or the sender side of the channel is dropped.
    pub(crate) fn run(mut self, rx: Receiver<Command>) {
        loop {
            let timeout = self.config.checkpoint_tick.min(self.config.reap_tick);
            match rx.recv_timeout(timeout) {
                Ok(Command::Append { encode, reply }) => {
                    let _ = reply.send(self.handle_append(encode));
                }
                Ok(Command::Commit { request_num, reply }) => {
                    self.state.commit(request_num);
                    let _ = reply.send(Ok(()));
                }
                Ok(Command::Recover { mut apply, reply }) => {
                    let result =
                        recovery::run(&self.segments, self.state.current_commit_num(), &mut *apply);
                    let _ = reply.send(result);
                }
                Ok(Command::Snapshot { reply }) => {
                    let _ = reply.send(Ok(self.state.snapshot()));
                }
                Ok(Command::Close { sync, reply }) => {
                    let result = self.handle_close(sync);
                    let _ = reply.send(result);
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = self.maybe_tick() {
                        error!(error = %e, "background checkpoint/reap tick failed");
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn maybe_tick(&mut self) -> Result<()> {
        let now = Instant::now();
        if now.duration_since(self.last_checkpoint_tick) >= self.config.checkpoint_tick {
            self.last_checkpoint_tick = now;
            if self.since_last_checkpoint > 0 {
                self.checkpoint()?;
            }
        }
        if now.duration_since(self.last_reap_tick) >= self.config.reap_tick {
            self.last_reap_tick = now;
            self.reap()?;
        }
        Ok(())
    }

    fn handle_append(&mut self, encode: EncodeFn) -> Result<u32> {
        let request_num = self.state.next_request_num();
        let body = encode(request_num).map_err(WalError::Codec)?;

        if self.segments.is_empty() {
            self.create_segment()?;
        }

        {
            let active = self.segments.last_mut().expect("segment created above");
            active.log.append(request_num, &body)?;
            self.state.set_current_file_offset(active.log.offset() as i64);
        }

        self.since_last_checkpoint += 1;
        self.since_last_bookmark += 1;
        self.since_last_rotation += 1;

        self.maybe_rotate()?;
        self.maybe_index()?;

        Ok(request_num)
    }

    fn create_segment(&mut self) -> Result<()> {
        let suffix = self.state.next_file_num();
        let log = LogSegment::open(discovery::log_path(&self.directory, suffix), suffix)?;
        let checkpoint = CheckpointFile::open(discovery::checkpoint_path(&self.directory, suffix), suffix)?;
        self.segments.push(SegmentPair { log, checkpoint });
        self.state.set_current_file_offset(0);
        Ok(())
    }

    fn maybe_rotate(&mut self) -> Result<()> {
        if self.since_last_rotation < self.config.rotate_threshold {
            return Ok(());
        }
        if self.since_last_checkpoint > 0 {
            self.checkpoint()?;
        }
        if self.since_last_bookmark > 0 {
            self.bookmark()?;
        }
        {
            let active = self.segments.last_mut().expect("active segment exists");
            active.log.sync()?;
            active.checkpoint.sync()?;
        }
        self.create_segment()?;
        self.since_last_rotation = 0;
        Ok(())
    }

    fn maybe_index(&mut self) -> Result<()> {
        if self.since_last_checkpoint >= self.config.checkpoint_threshold {
            self.checkpoint()?;
        }
        if self.since_last_bookmark >= self.config.bookmark_threshold {
            self.bookmark()?;
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        let current_request_num = self.state.current_request_num();
        let current_file_offset = self.state.current_file_offset();
        let since = self.since_last_checkpoint;
        let active = self
            .segments
            .last_mut()
            .expect("a checkpoint is only ever due after an append created a segment");
        let first_offset = active.checkpoint.last_offset();
        active.checkpoint.append(CheckpointRecord {
            req_start: current_request_num - since + 1,
            req_end: current_request_num,
            first_offset,
            last_offset: current_file_offset,
        })?;
        self.since_last_checkpoint = 0;
        Ok(())
    }

    fn bookmark(&mut self) -> Result<()> {
        self.state.sync(&self.bookmark_path)?;
        self.since_last_bookmark = 0;
        Ok(())
    }

    /// Delete every segment pair strictly before the one covering the
    /// durable commit watermark. The active segment is never reaped.
    fn reap(&mut self) -> Result<()> {
        if self.segments.len() <= 1 {
            return Ok(());
        }
        let commit_num = self.state.current_commit_num();
        let active_idx = self.segments.len() - 1;
        let covering = self.segments[..active_idx]
            .iter()
            .position(|pair| pair.checkpoint.offset_for(commit_num).is_some());
        let Some(k) = covering else {
            return Ok(());
        };

        for pair in self.segments.drain(0..k) {
            let suffix = pair.log.suffix();
            info!(suffix, "reaping obsolete segment pair");
            pair.log.delete()?;
            pair.checkpoint.delete()?;
        }
        Ok(())
    }

    fn handle_close(&mut self, sync: bool) -> Result<()> {
        if !sync {
            return Ok(());
        }
        if self.since_last_checkpoint > 0 {
            self.checkpoint()?;
        }
        self.bookmark()?;
        if let Some(active) = self.segments.last_mut() {
            active.log.sync()?;
            active.checkpoint.sync()?;
        }
        Ok(())
    }
}

/// Construct the actor synchronously (so directory/codec errors surface
/// to the caller of `open()`), then hand it off to its own thread.
pub(crate) fn spawn(config: WalConfig) -> Result<(SyncSender<Command>, JoinHandle<()>)> {
    let actor = Actor::new(config)?;
    let (tx, rx) = mpsc::sync_channel(actor.channel_capacity());
    let join = thread::Builder::new()
        .name("tsdb-wal-actor".to_string())
        .spawn(move || actor.run(rx))
        .expect("failed to spawn WAL actor thread");
    Ok((tx, join))
}
