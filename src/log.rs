//! Supervisor facade (C9): the single entry point for every operation in
//! §4.1. Owns the log and metadata file handles, the in-memory `LogState`,
//! and the observability counters, behind one mutex (§4.9).

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::codec::Entry;
use crate::error::{Error, Result};
use crate::file::FileExt;
use crate::metadata::{Metadata, MetadataStore};
use crate::read;
use crate::reconcile;
use crate::recovery::{self, DEFAULT_RECOVERY_BLOCK_SIZE};
use crate::state::{ConfigValue, LogState};
use crate::write::{self, NewEntry};

/// A peer identifier. Kept as a thin newtype over an owned string (the
/// "simple name" case of §6) so a future clustering extension can widen it
/// without touching the log's internals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(name: impl Into<String>) -> Self {
        PeerId(name.into())
    }

    /// The symbolic address this peer's actor is conceptually registered
    /// under (§6): `<name>_log`.
    pub fn log_address(&self) -> String {
        format!("{}_log", self.0)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Knobs the log exposes at `open` time, in lieu of environment variables or
/// a CLI (§6).
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory the log and metadata files live in.
    pub directory: PathBuf,
    /// Size of the backward-scanning window used by the recovery scanner
    /// (§4.4 step 1). Defaults to 1 MiB.
    pub recovery_block_size: u64,
    /// Capacity of the index→offset hint cache (§4.7). Defaults to 1000.
    pub hint_capacity: usize,
}

impl Options {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Options {
            directory: directory.into(),
            recovery_block_size: DEFAULT_RECOVERY_BLOCK_SIZE,
            hint_capacity: crate::hints::MAX_HINTS,
        }
    }

    pub fn with_recovery_block_size(mut self, block_size: u64) -> Self {
        self.recovery_block_size = block_size;
        self
    }

    pub fn with_hint_capacity(mut self, hint_capacity: usize) -> Self {
        self.hint_capacity = hint_capacity;
        self
    }
}

struct Inner {
    /// `None` once `stop()` has run: every operation that touches the file
    /// must fail with `Error::Closed` rather than silently reopening it.
    file: Option<File>,
    state: LogState,
    metadata: MetadataStore,
}

/// Borrow the file handle out of `Option<File>`, or `Error::Closed` once
/// `stop()` has taken it. A free function (not a method on `Inner`) so the
/// borrow checker can see it touches only the `file` field, leaving
/// `inner.state` free to be borrowed mutably alongside it.
fn require_file(file: &Option<File>) -> Result<&File> {
    file.as_ref().ok_or(Error::Closed)
}

/// A single peer's persistent log: the public contract of §4.1, serialized
/// behind one mutex-guarded struct (§4.9).
pub struct RaftLog {
    peer: PeerId,
    inner: Mutex<Inner>,
}

impl RaftLog {
    /// Open (creating if absent) the log and metadata files for `peer` under
    /// `options.directory`, running recovery (§4.4) on a non-empty log.
    pub fn open(peer: PeerId, options: Options) -> Result<Self> {
        std::fs::create_dir_all(&options.directory)?;
        let log_path = log_path(&options.directory, &peer);

        tracing::debug!(peer = %peer, path = %log_path.display(), "opening log file");
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&log_path)?;

        let log_file_size = file.len()?;
        let state = recovery::recover(&file, options.recovery_block_size, options.hint_capacity)?;
        let metadata = MetadataStore::new(&options.directory, &peer.0);
        // Touch `load` once so a malformed metadata file is logged at open
        // time rather than silently on first caller `get_metadata`.
        let _ = metadata.load(log_file_size)?;

        Ok(RaftLog {
            peer,
            inner: Mutex::new(Inner {
                file: Some(file),
                state,
                metadata,
            }),
        })
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Leader-mode append (§4.1, §4.3). Returns the final assigned index.
    pub fn append(&self, entries: Vec<NewEntry>) -> Result<u64> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let file = require_file(&inner.file)?;
        write::append(file, &mut inner.state, entries)
    }

    /// Follower-mode check-and-append (§4.1, §4.6). Returns the resulting
    /// `last_index`.
    pub fn check_and_append(&self, entries: Vec<Entry>, start_index: u64) -> Result<u64> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let file = require_file(&inner.file)?;
        reconcile::check_and_append(file, &mut inner.state, entries, start_index)
    }

    /// Returns the entry at `index`, or `None` if `index < 1` or
    /// `index > last_index`.
    pub fn get_entry(&self, index: u64) -> Result<Option<Entry>> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let file = require_file(&inner.file)?;
        read::get_entry(file, &mut inner.state, index)
    }

    /// Served from the in-memory cache, without I/O (§4.5).
    pub fn get_last_entry(&self) -> Option<Entry> {
        self.inner.lock().state.last_entry.clone()
    }

    pub fn get_last_index(&self) -> u64 {
        self.inner.lock().state.last_index
    }

    /// The term at `index`, or 0 if absent. Callers must use `get_last_index`
    /// to disambiguate "absent" from "term 0" (§9).
    pub fn get_term(&self, index: u64) -> Result<u64> {
        Ok(self.get_entry(index)?.map_or(0, |e| e.term))
    }

    pub fn get_config(&self) -> ConfigValue {
        self.inner.lock().state.config.clone()
    }

    pub fn get_metadata(&self) -> Result<Metadata> {
        let inner = self.inner.lock();
        let log_file_size = require_file(&inner.file)?.len()?;
        inner.metadata.load(log_file_size)
    }

    /// Durably overwrite the metadata file (§4.1, §4.8).
    pub fn set_metadata(&self, voted_for: Option<String>, current_term: u64) -> Result<()> {
        let inner = self.inner.lock();
        require_file(&inner.file)?;
        inner.metadata.store(&Metadata {
            current_term,
            voted_for,
        })
    }

    /// Number of decimation passes the hint cache has performed (§4.7),
    /// exposed purely for observability.
    pub fn prune_count(&self) -> u64 {
        self.inner.lock().state.hints.prune_count()
    }

    /// Frequency histogram of forward-scan lengths on `get_entry` (§4.5),
    /// exposed purely for observability.
    pub fn seek_histogram(&self) -> std::collections::BTreeMap<u64, u64> {
        self.inner.lock().state.hints.seek_histogram().clone()
    }

    /// Flush and close (§4.1, §5): drains the actor and releases the log
    /// file handle. Idempotent; every operation after `stop` fails with
    /// `Error::Closed` rather than silently reopening the file.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(file) = inner.file.take() {
            file.sync_all()?;
            drop(file);
        }
        Ok(())
    }
}

fn log_path(dir: &Path, peer: &PeerId) -> PathBuf {
    dir.join(format!("rafter_{}.log", peer.0))
}
