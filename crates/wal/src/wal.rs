//! The public WAL handle.

use std::error::Error as StdError;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use tsdb_wal_core::Request;

use crate::actor::{self, Command};
use crate::bookmark::BookmarkSnapshot;
use crate::config::WalConfig;
use crate::error::{Result, WalError};

/// A handle to a running write-ahead log.
///
/// Cheap to share across producer threads behind an `Arc`: every call
/// round-trips through the actor's request channel, so no internal
/// locking is needed here beyond the one-time join on [`Wal::close`].
pub struct Wal {
    tx: mpsc::SyncSender<Command>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Wal {
    /// Open (or create) the WAL rooted at `config.directory`.
    ///
    /// Creates the directory if missing, loads the bookmark, discovers
    /// and opens every segment pair (validating tails along the way),
    /// and starts the actor thread. Does **not** run recovery — call
    /// [`Wal::recover_from_last_commit`] once, before the first
    /// `append`.
    pub fn open(config: WalConfig) -> Result<Wal> {
        config.validate()?;
        let (tx, join) = actor::spawn(config)?;
        Ok(Wal {
            tx,
            join: Mutex::new(Some(join)),
        })
    }

    /// Assign the next request number, stamp it into `req`, and append
    /// the encoded result to the active segment. Blocks until the actor
    /// has processed the request; the entry is in the OS write buffer
    /// when this returns, not necessarily fsynced (see [`Wal::close`]).
    pub fn append<R>(&self, mut req: R) -> Result<u32>
    where
        R: Request + Send + 'static,
    {
        let encode = Box::new(move |request_num: u32| {
            req.set_request_num(request_num);
            req.encode()
        });
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Command::Append {
                encode,
                reply: reply_tx,
            })
            .map_err(|_| WalError::ActorGone)?;
        reply_rx.recv().map_err(|_| WalError::ActorGone)?
    }

    /// Advance the in-memory commit watermark to `request_num`. Does not
    /// force a bookmark sync.
    pub fn commit(&self, request_num: u32) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Command::Commit {
                request_num,
                reply: reply_tx,
            })
            .map_err(|_| WalError::ActorGone)?;
        reply_rx.recv().map_err(|_| WalError::ActorGone)?
    }

    /// Replay every request with `request_num` greater than the durable
    /// commit watermark, in increasing order, decoding each as `R` and
    /// invoking `apply`. Must be called once, after `open`, before any
    /// `append`.
    pub fn recover_from_last_commit<R, F, E>(&self, mut apply: F) -> Result<()>
    where
        R: Request,
        F: FnMut(R) -> std::result::Result<(), E> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let apply_fn = Box::new(move |request_num: u32, body: Vec<u8>| {
            let mut req = R::decode(&body)
                .map_err(|e| -> Box<dyn StdError + Send + Sync> { Box::new(e) })?;
            req.set_request_num(request_num);
            apply(req).map_err(|e| -> Box<dyn StdError + Send + Sync> { Box::new(e) })
        });
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Command::Recover {
                apply: apply_fn,
                reply: reply_tx,
            })
            .map_err(|_| WalError::ActorGone)?;
        reply_rx.recv().map_err(|_| WalError::ActorGone)?
    }

    /// Read back the current bookmark counters: last assigned request
    /// number, active segment suffix and offset, and the durable commit
    /// watermark. Mainly useful for tests and operational introspection.
    pub fn bookmark_snapshot(&self) -> Result<BookmarkSnapshot> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Command::Snapshot { reply: reply_tx })
            .map_err(|_| WalError::ActorGone)?;
        reply_rx.recv().map_err(|_| WalError::ActorGone)?
    }

    /// Graceful shutdown. When `sync` is true, forces a final checkpoint
    /// record (if requests have landed since the last one), syncs the
    /// bookmark, and fsyncs the active segment pair before the actor
    /// thread exits.
    pub fn close(&self, sync: bool) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Command::Close {
                sync,
                reply: reply_tx,
            })
            .map_err(|_| WalError::ActorGone)?;
        let result = reply_rx.recv().map_err(|_| WalError::ActorGone)?;

        if let Some(join) = self.join.lock().expect("join mutex poisoned").take() {
            let _ = join.join();
        }
        result
    }
}
