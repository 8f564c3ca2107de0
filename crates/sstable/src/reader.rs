use bloom::BloomFilter;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::format::{decode_index, read_data_header, DATA_HEADER_BYTES, MAX_KEY_BYTES, MAX_VALUE_BYTES};
use crate::SSTableError;

/// Reads one segment for point lookups.
///
/// On [`open`](SSTableReader::open) the sparse index and the bloom filter are
/// loaded into memory. The data file stays on disk; a lookup reads at most one
/// index block of it.
///
/// A persistent file handle is kept open for the lifetime of the reader,
/// wrapped in a `Mutex` so that `get` can be called through a shared `&self`
/// reference.
pub struct SSTableReader {
    data_path: PathBuf,
    index_path: PathBuf,
    /// Sparse `(key, data offset)` samples, ascending by key.
    index: Vec<(Vec<u8>, u64)>,
    bloom: BloomFilter,
    /// Length of the data file at open time.
    data_len: u64,
    /// Persistent data-file handle, wrapped in Mutex for interior mutability.
    file: Mutex<BufReader<File>>,
}

impl SSTableReader {
    /// Opens a segment and loads its sparse index and bloom filter.
    ///
    /// # Errors
    ///
    /// [`SSTableError::Corrupt`] if the index file lacks the bloom marker, the
    /// filter does not decode, the index keys are not ascending, the first
    /// entry does not point at offset 0, or an offset lies beyond the end of
    /// the data file. [`SSTableError::Io`] if either file cannot be read.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(data_path: P, index_path: Q) -> Result<Self, SSTableError> {
        let data_path = data_path.as_ref().to_path_buf();
        let index_path = index_path.as_ref().to_path_buf();

        let file = File::open(&data_path)?;
        let data_len = file.metadata()?.len();

        let bytes = fs::read(&index_path)?;
        let (index, bloom) = decode_index(&bytes)?;

        match index.first() {
            None => return Err(SSTableError::Corrupt("sparse index is empty".to_string())),
            Some((_, offset)) if *offset != 0 => {
                return Err(SSTableError::Corrupt(format!(
                    "first index entry points at offset {} instead of 0",
                    offset
                )))
            }
            Some(_) => {}
        }
        for pair in index.windows(2) {
            if pair[0].0 >= pair[1].0 || pair[0].1 >= pair[1].1 {
                return Err(SSTableError::Corrupt(
                    "sparse index is not strictly ascending".to_string(),
                ));
            }
        }
        if let Some((_, last)) = index.last() {
            if *last >= data_len {
                return Err(SSTableError::Corrupt(format!(
                    "index offset {} beyond data file length {}",
                    last, data_len
                )));
            }
        }

        debug!(
            data = %data_path.display(),
            index_entries = index.len(),
            data_len,
            "opened segment"
        );

        Ok(Self {
            data_path,
            index_path,
            index,
            bloom,
            data_len,
            file: Mutex::new(BufReader::new(file)),
        })
    }

    /// Point lookup for a single key.
    ///
    /// 1. The bloom filter rules the key out without any disk read.
    /// 2. Binary search of the sparse index finds the block `[lower, upper)`
    ///    that would hold the key.
    /// 3. The block is scanned sequentially; the scan stops at the first key
    ///    greater than the target.
    ///
    /// Returns `Ok(None)` when the key is not in this segment.
    ///
    /// # Errors
    ///
    /// [`SSTableError::Corrupt`] if a record runs past the end of the data
    /// file; [`SSTableError::Io`] on read failure.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SSTableError> {
        // Fast path: bloom filter says "definitely not here"
        if !self.bloom.might_contain(key) {
            return Ok(None);
        }

        let (lower, upper) = match self.block_range(key) {
            Some(range) => range,
            None => return Ok(None),
        };

        let mut f = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "segment file lock poisoned"))?;

        // The file can shrink under an open reader; running out of bytes
        // mid-block is corruption, not an I/O fault.
        match self.scan_block(&mut *f, key, lower, upper) {
            Err(SSTableError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(self.truncated(lower))
            }
            other => other,
        }
    }

    /// Sequential scan of `[lower, upper)` for `key`, stopping at the first
    /// greater key.
    fn scan_block(
        &self,
        f: &mut BufReader<File>,
        key: &[u8],
        lower: u64,
        upper: u64,
    ) -> Result<Option<Vec<u8>>, SSTableError> {
        f.seek(SeekFrom::Start(lower))?;

        let mut pos = lower;
        let mut key_buf = Vec::new();
        while pos < upper {
            if pos + DATA_HEADER_BYTES > self.data_len {
                return Err(self.truncated(pos));
            }
            let (key_len, val_len) = read_data_header(&mut *f)?;
            if key_len > MAX_KEY_BYTES || val_len > MAX_VALUE_BYTES {
                return Err(SSTableError::Corrupt(format!(
                    "record at offset {} has key_len {} val_len {}",
                    pos, key_len, val_len
                )));
            }
            let record_end = pos + DATA_HEADER_BYTES + key_len as u64 + val_len as u64;
            if record_end > self.data_len {
                return Err(self.truncated(pos));
            }

            key_buf.resize(key_len, 0);
            f.read_exact(&mut key_buf)?;

            match key_buf.as_slice().cmp(key) {
                Ordering::Equal => {
                    let mut value = vec![0u8; val_len];
                    f.read_exact(&mut value)?;
                    return Ok(Some(value));
                }
                // Sorted data: we've passed where the key would be.
                Ordering::Greater => return Ok(None),
                Ordering::Less => f.seek_relative(val_len as i64)?,
            }
            pos = record_end;
        }

        Ok(None)
    }

    /// Byte range of the data file that could contain `key`, or `None` if the
    /// key sorts before the first key of the segment.
    fn block_range(&self, key: &[u8]) -> Option<(u64, u64)> {
        // Number of indexed keys <= key; the last of them starts our block.
        let i = self.index.partition_point(|(k, _)| k.as_slice() <= key);
        if i == 0 {
            return None;
        }
        let lower = self.index[i - 1].1;
        let upper = self.index.get(i).map_or(self.data_len, |(_, off)| *off);
        Some((lower, upper))
    }

    fn truncated(&self, pos: u64) -> SSTableError {
        SSTableError::Corrupt(format!(
            "data file {} is shorter than the index implies (record at offset {})",
            self.data_path.display(),
            pos
        ))
    }

    /// The in-memory sparse index: `(key, data offset)` pairs.
    #[must_use]
    pub fn sparse_index(&self) -> &[(Vec<u8>, u64)] {
        &self.index
    }

    /// The segment's bloom filter.
    #[must_use]
    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    /// Size of the data file in bytes.
    #[must_use]
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }
}

impl std::fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTableReader")
            .field("data_path", &self.data_path)
            .field("index_entries", &self.index.len())
            .field("data_len", &self.data_len)
            .field("bloom", &self.bloom)
            .finish()
    }
}
