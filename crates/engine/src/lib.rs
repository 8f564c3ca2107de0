//! # Engine - lsmkv storage engine
//!
//! The orchestrator that ties the [`memtable`], [`wal`] and [`sstable`] crates
//! together into a small LSM-tree key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → WAL append → Memtable insert       │
//! │              |                                │
//! │              |  (len >= capacity?)            │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → new segment, WAL reset    │
//! │                                               │
//! │ read.rs → Memtable → segments newest → oldest │
//! │            (first match wins)                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                |
//! |--------------|--------------------------------------------------------|
//! | `lib.rs`     | `Engine` struct, `open`, `close`, `stats`, `Debug`     |
//! | [`recovery`] | WAL replay, segment discovery, tmp file cleanup        |
//! | [`write`]    | `set()`, `flush()`                                     |
//! | [`read`]     | `get()`, `keys()`                                      |
//! | [`segment`]  | Segment file naming                                    |
//!
//! ## On-disk layout
//!
//! ```text
//! <db_dir>/wal.log
//! <db_dir>/sst-00000000000000000001.sst
//! <db_dir>/sst-00000000000000000001.index
//! ...
//! ```
//!
//! ## Crash Safety
//!
//! Every write is appended (and by default fsynced) to the WAL **before** the
//! Memtable update. The WAL is only reset **after** the flushed segment is on
//! disk and registered. Segments are written via temp files + rename, so a
//! crash mid-flush leaves either no segment or a complete one.
mod error;
mod read;
mod recovery;
mod segment;
mod write;

pub use config::EngineConfig;
pub use error::{Error, Result};

use memtable::Memtable;
use segment::Segment;
use std::path::{Path, PathBuf};
use tracing::info;
use wal::WalWriter;

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = sstable::MAX_KEY_BYTES;
/// Maximum allowed value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = sstable::MAX_VALUE_BYTES;

/// Name of the write-ahead log inside the database directory.
pub const WAL_FILE_NAME: &str = "wal.log";

/// Lifecycle of an [`Engine`]. The WAL handle only exists while open.
pub(crate) enum EngineState {
    Open { wal: WalWriter },
    Closed,
}

/// Per-segment line of [`EngineStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStat {
    pub id: u64,
    /// Size of the segment's data file in bytes.
    pub data_bytes: u64,
}

/// Snapshot of the engine's state, as printed by the `STATS` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    /// Entries currently held in the memtable.
    pub memtable_count: usize,
    pub segment_count: usize,
    pub capacity: usize,
    pub db_dir: PathBuf,
    /// Segments oldest first.
    pub segments: Vec<SegmentStat>,
}

/// The storage engine: one memtable, one WAL, and a list of immutable segments.
///
/// # Write Path
///
/// 1. Append the record to the WAL (crash-safe durability).
/// 2. Insert it into the Memtable.
/// 3. If the Memtable holds `capacity` entries, flush it to a new segment and
///    reset the WAL.
///
/// # Read Path
///
/// 1. Check the Memtable (freshest data).
/// 2. Check segments from newest to oldest.
/// 3. First match wins.
///
/// # Recovery
///
/// [`Engine::open`] replays the WAL into a fresh Memtable and loads every
/// segment found in the database directory.
///
/// Every operation takes `&mut self` or `&self`, so the write sequence
/// {WAL append, Memtable insert, capacity check, flush} can never interleave
/// with another call.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) mem: Memtable,
    /// Ordered newest-first.
    pub(crate) segments: Vec<Segment>,
    pub(crate) wal_path: PathBuf,
    /// Id the next flushed segment will get.
    pub(crate) next_segment_id: u64,
    pub(crate) state: EngineState,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("db_dir", &self.config.db_dir)
            .field("capacity", &self.config.capacity)
            .field("sparsity", &self.config.sparsity)
            .field("wal_sync", &self.config.wal_sync)
            .field("open", &self.is_open())
            .field("memtable_entries", &self.mem.len())
            .field("memtable_size", &self.mem.approx_size())
            .field("segment_count", &self.segments.len())
            .field("next_segment_id", &self.next_segment_id)
            .finish()
    }
}

impl Engine {
    /// Opens (or creates) the database described by `config` and recovers
    /// its state.
    ///
    /// # Recovery Steps
    ///
    /// 1. Validate the configuration.
    /// 2. Create the database directory if it does not exist.
    /// 3. Remove leftover `*.tmp` files from interrupted flushes.
    /// 4. Replay the WAL into a fresh Memtable.
    /// 5. Open the WAL writer in append mode.
    /// 6. Load segments oldest to newest and pick the next segment id.
    /// 7. Flush if the replayed Memtable is already at `capacity`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for a bad configuration, [`Error::Corrupt`]
    /// if a segment cannot be decoded, [`Error::Io`] on disk failure.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let db_dir = config.db_dir.clone();

        std::fs::create_dir_all(&db_dir)?;
        recovery::cleanup_tmp_files(&db_dir);

        // Replay before opening the writer so the two never share the file.
        let wal_path = db_dir.join(WAL_FILE_NAME);
        let mut mem = Memtable::new();
        let replayed = recovery::replay_wal(&wal_path, &mut mem)?;

        let wal = WalWriter::create(&wal_path, config.wal_sync)?;

        let (segments, next_segment_id) = recovery::load_segments(&db_dir)?;

        info!(
            db_dir = %db_dir.display(),
            replayed,
            memtable_entries = mem.len(),
            segments = segments.len(),
            next_segment_id,
            "engine opened"
        );

        let mut engine = Self {
            config,
            mem,
            segments,
            wal_path,
            next_segment_id,
            state: EngineState::Open { wal },
        };

        // A crash after the index rename but before the WAL reset, or a
        // smaller capacity than last time, can leave a full Memtable.
        if engine.mem.len() >= engine.config.capacity {
            engine.flush()?;
        }
        Ok(engine)
    }

    /// Closes the WAL and moves the engine to the closed state.
    ///
    /// Unflushed Memtable entries stay in the WAL and come back on the next
    /// [`open`](Self::open). Closing twice returns [`Error::EngineClosed`].
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, EngineState::Closed) {
            EngineState::Open { wal } => {
                wal.close()?;
                info!(db_dir = %self.config.db_dir.display(), "engine closed");
                Ok(())
            }
            EngineState::Closed => Err(Error::EngineClosed),
        }
    }

    /// Returns a snapshot of the engine's counters.
    pub fn stats(&self) -> Result<EngineStats> {
        self.ensure_open()?;
        Ok(EngineStats {
            memtable_count: self.mem.len(),
            segment_count: self.segments.len(),
            capacity: self.config.capacity,
            db_dir: self.config.db_dir.clone(),
            segments: self
                .segments
                .iter()
                .rev()
                .map(|s| SegmentStat {
                    id: s.id,
                    data_bytes: s.reader.data_len(),
                })
                .collect(),
        })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.state, EngineState::Open { .. })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn db_dir(&self) -> &Path {
        &self.config.db_dir
    }

    #[must_use]
    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Number of segments on disk.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of entries in the Memtable.
    #[must_use]
    pub fn memtable_len(&self) -> usize {
        self.mem.len()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        match self.state {
            EngineState::Open { .. } => Ok(()),
            EngineState::Closed => Err(Error::EngineClosed),
        }
    }

    pub(crate) fn wal_mut(&mut self) -> Result<&mut WalWriter> {
        match &mut self.state {
            EngineState::Open { wal } => Ok(wal),
            EngineState::Closed => Err(Error::EngineClosed),
        }
    }
}

#[cfg(test)]
mod tests;
