//! # WAL - Write-Ahead Log
//!
//! Provides crash-safe durability for the lsmkv storage engine.
//!
//! Every `SET` is serialized into a binary record and appended to the WAL
//! **before** the corresponding memtable update. On restart the WAL is replayed
//! to reconstruct the memtable, so no acknowledged write is lost. After a
//! successful flush the new SSTable segment carries the durability guarantee
//! and the WAL is reset.
//!
//! ## Binary Record Format
//!
//! ```text
//! [key_len: u32 LE][val_len: u32 LE][checksum_len: u32 LE][key][value][checksum]
//! ```
//!
//! `checksum` is the CRC-32 of `key ‖ value` stored as 4 little-endian bytes,
//! so `checksum_len` is always 4 for records written by this crate.
//!
//! ## Replay policy
//!
//! Replay stops at the first record that is truncated or fails validation and
//! treats the log as ending there. A crash can only tear the tail record, so
//! everything before it is intact.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{WalReader, WalWriter};
//!
//! let mut w = WalWriter::create("wal.log", true).unwrap();
//! w.append(b"hello", b"world").unwrap();
//! w.close().unwrap();
//!
//! for rec in WalReader::open("wal.log").unwrap() {
//!     let rec = rec.unwrap();
//!     println!("{:?} -> {:?}", rec.key, rec.value);
//! }
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// Size of the fixed record header: three `u32` length fields.
pub const HEADER_BYTES: usize = 4 + 4 + 4;

/// Length of the checksum field written by [`WalWriter::append`].
pub const CHECKSUM_BYTES: u32 = 4;

/// Largest key length replay will allocate for (64 KiB).
const MAX_KEY_BYTES: usize = 64 * 1024;
/// Largest value length replay will allocate for (10 MiB).
const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// A single key-value write recovered from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// The lookup key.
    pub key: Vec<u8>,
    /// The payload value.
    pub value: Vec<u8>,
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded (length exceeds the `u32` framing).
    #[error("record too large: {0} bytes")]
    RecordTooLarge(usize),
}

/// Computes the record checksum over `key ‖ value`.
#[must_use]
pub fn checksum(key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Encodes one record into `buf` (cleared first).
pub fn encode_record(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) -> Result<(), WalError> {
    let key_len = u32::try_from(key.len()).map_err(|_| WalError::RecordTooLarge(key.len()))?;
    let val_len = u32::try_from(value.len()).map_err(|_| WalError::RecordTooLarge(value.len()))?;

    buf.clear();
    buf.write_u32::<LittleEndian>(key_len)?;
    buf.write_u32::<LittleEndian>(val_len)?;
    buf.write_u32::<LittleEndian>(CHECKSUM_BYTES)?;
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    buf.write_u32::<LittleEndian>(checksum(key, value))?;
    Ok(())
}

/// Append-only WAL writer.
///
/// Records are encoded into a reusable buffer and written with a single
/// `write_all`. When `sync` is `true`, every append is followed by
/// `sync_all()` so the record is on stable storage before the call returns.
///
/// The file handle is released when the writer is dropped; [`close`](Self::close)
/// additionally syncs and reports any error from doing so.
#[derive(Debug)]
pub struct WalWriter {
    file: File,
    path: PathBuf,
    sync: bool,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    ///
    /// # Arguments
    ///
    /// * `path` - file system path for the WAL (created if it does not exist).
    /// * `sync` - if true, every `append` call is followed by `fsync`.
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), sync, "opened WAL");
        Ok(Self {
            file,
            path,
            sync,
            buf: Vec::with_capacity(256),
        })
    }

    /// Appends one `key`/`value` record to the log.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the write or the sync fails. The caller must
    /// not treat the write as durable in that case.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), WalError> {
        encode_record(&mut self.buf, key, value)?;

        self.file.write_all(&self.buf)?;
        self.file.flush()?;

        if self.sync {
            self.file.sync_all()?;
        }

        Ok(())
    }

    /// Forces all written data to disk via `sync_all()`.
    ///
    /// Useful when `sync` is `false` and the caller wants durability at a
    /// specific point.
    pub fn sync_to_disk(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncates the log to zero bytes.
    ///
    /// Called right after a successful flush: every record in the log is now
    /// reflected in an SSTable segment. Later appends start at offset 0 because
    /// the file is opened in append mode.
    pub fn reset(&mut self) -> Result<(), WalError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        info!(path = %self.path.display(), "WAL reset");
        Ok(())
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syncs and closes the log, releasing the file handle.
    pub fn close(mut self) -> Result<(), WalError> {
        self.sync_to_disk()?;
        info!(path = %self.path.display(), "WAL closed");
        Ok(())
    }
}

/// Sequential WAL reader yielding valid records as an iterator.
///
/// The reader is generic over any `Read` implementor, so it works with real
/// files (`WalReader<File>`) or in-memory buffers in tests. It is a one-shot
/// sequence: once exhausted (or stopped at a bad record) it yields nothing
/// further.
///
/// Items are `Err` only for genuine I/O failures. A truncated or corrupt
/// record ends the iteration; [`stopped_at`](Self::stopped_at) then reports
/// the byte offset of that record.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
    /// Offset of the next record to read.
    offset: u64,
    done: bool,
    stopped_at: Option<u64>,
}

impl WalReader<File> {
    /// Opens an existing WAL file for sequential replay.
    ///
    /// Returns `WalError::Io` if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader::from_reader(f))
    }
}

impl<R: Read> WalReader<R> {
    /// Constructs a reader from any `Read` implementor.
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
            offset: 0,
            done: false,
            stopped_at: None,
        }
    }

    /// Byte offset of the record at which replay stopped because it was
    /// truncated or corrupt. `None` if the log ended cleanly (or iteration has
    /// not reached the end yet).
    #[must_use]
    pub fn stopped_at(&self) -> Option<u64> {
        self.stopped_at
    }

    /// Reads into `buf` until it is full or EOF; returns the number of bytes read.
    fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.rdr.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn stop(&mut self, reason: &str) {
        warn!(offset = self.offset, reason, "WAL replay stopped at bad record");
        self.stopped_at = Some(self.offset);
        self.done = true;
    }

    /// Reads the next record. `Ok(None)` ends the sequence.
    fn next_record(&mut self) -> io::Result<Option<WalRecord>> {
        let mut header = [0u8; HEADER_BYTES];
        let n = self.read_full(&mut header)?;
        if n == 0 {
            self.done = true;
            return Ok(None);
        }
        if n < HEADER_BYTES {
            self.stop("truncated header");
            return Ok(None);
        }

        let mut hr = &header[..];
        let key_len = hr.read_u32::<LittleEndian>()? as usize;
        let val_len = hr.read_u32::<LittleEndian>()? as usize;
        let checksum_len = hr.read_u32::<LittleEndian>()?;

        // Reject absurd sizes before allocating anything.
        if checksum_len != CHECKSUM_BYTES {
            self.stop("unexpected checksum length");
            return Ok(None);
        }
        if key_len > MAX_KEY_BYTES || val_len > MAX_VALUE_BYTES {
            self.stop("length field out of range");
            return Ok(None);
        }

        let mut payload = vec![0u8; key_len + val_len + CHECKSUM_BYTES as usize];
        if self.read_full(&mut payload)? < payload.len() {
            self.stop("truncated payload");
            return Ok(None);
        }

        let stored = u32::from_le_bytes([
            payload[key_len + val_len],
            payload[key_len + val_len + 1],
            payload[key_len + val_len + 2],
            payload[key_len + val_len + 3],
        ]);
        payload.truncate(key_len + val_len);
        let value = payload.split_off(key_len);
        let key = payload;

        if checksum(&key, &value) != stored {
            self.stop("checksum mismatch");
            return Ok(None);
        }

        self.offset += (HEADER_BYTES + key_len + val_len) as u64 + CHECKSUM_BYTES as u64;
        Ok(Some(WalRecord { key, value }))
    }
}

impl<R: Read> Iterator for WalReader<R> {
    type Item = Result<WalRecord, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(WalError::Io(e)))
            }
        }
    }
}
