/// Write path: `set()` and `flush()`.
///
/// Each write is first appended to the WAL for durability, then applied to
/// the in-memory Memtable. When the Memtable reaches `capacity` entries it is
/// persisted to a new segment on disk and the WAL is reset.
use std::fs;
use tracing::{info, warn};

use crate::segment::{self, Segment};
use crate::{Engine, Error, Result, MAX_KEY_SIZE, MAX_VALUE_SIZE};
use sstable::SSTableWriter;

impl Engine {
    /// Inserts or overwrites a key (the `SET` command).
    ///
    /// If the WAL append fails, the Memtable is left untouched and the error
    /// is returned. If the insert fills the Memtable, the flush runs before
    /// this call returns; should that flush fail, the write itself stays
    /// applied and durable and the error is returned.
    ///
    /// # Errors
    ///
    /// [`Error::EngineClosed`] after [`close`](Engine::close),
    /// [`Error::InvalidParameter`] for an empty or oversized key or an
    /// oversized value, [`Error::Io`] on WAL or flush failure.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        if key.is_empty() {
            return Err(Error::InvalidParameter("key must not be empty".to_string()));
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::InvalidParameter(format!(
                "key too large: {} bytes (max {})",
                key.len(),
                MAX_KEY_SIZE
            )));
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::InvalidParameter(format!(
                "value too large: {} bytes (max {})",
                value.len(),
                MAX_VALUE_SIZE
            )));
        }

        // Append to WAL first
        self.wal_mut()?.append(&key, &value)?;

        // Apply to memtable
        let count = self.mem.set(key, value);

        if count >= self.config.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Persists the Memtable as a new segment (the `FLUSH` command).
    ///
    /// A no-op if the Memtable is empty.
    ///
    /// # Steps
    ///
    /// 1. Drain the Memtable into a sorted run.
    /// 2. Write `sst-{id}.sst` / `sst-{id}.index` (atomic temp + rename).
    /// 3. Open a reader for it and register it as the newest segment.
    /// 4. Reset the WAL to zero bytes.
    ///
    /// If step 2 or 3 fails, the drained entries go back into the Memtable,
    /// the WAL is not touched and the segment id is not consumed, so the
    /// caller can simply retry.
    ///
    /// # Errors
    ///
    /// [`Error::EngineClosed`] after [`close`](Engine::close),
    /// [`Error::Io`] on disk failure.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.mem.is_empty() {
            return Ok(());
        }

        let pairs = self.mem.drain_sorted();
        let id = self.next_segment_id;

        let segment = match self.write_segment(id, &pairs) {
            Ok(segment) => segment,
            Err(e) => {
                warn!(segment = id, error = %e, "flush failed; memtable restored");
                self.mem.restore(pairs);
                return Err(e);
            }
        };

        let data_bytes = segment.reader.data_len();
        self.segments.insert(0, segment);
        self.next_segment_id = id + 1;

        // The segment now covers everything the WAL held.
        self.wal_mut()?.reset()?;

        info!(
            segment = id,
            entries = pairs.len(),
            data_bytes,
            segments = self.segments.len(),
            "memtable flushed"
        );
        Ok(())
    }

    fn write_segment(&self, id: u64, pairs: &[(Vec<u8>, Vec<u8>)]) -> Result<Segment> {
        let dir = &self.config.db_dir;
        let data_path = segment::data_path(dir, id);
        let index_path = segment::index_path(dir, id);

        SSTableWriter::write_with_fpr(
            pairs,
            &data_path,
            &index_path,
            self.config.sparsity,
            self.config.bloom_fpr,
        )?;

        match Segment::open(dir, id) {
            Ok(segment) => Ok(segment),
            Err(e) => {
                // Not registered, so it must not be picked up by the next open either.
                let _ = fs::remove_file(&index_path);
                let _ = fs::remove_file(&data_path);
                Err(e.into())
            }
        }
    }
}
