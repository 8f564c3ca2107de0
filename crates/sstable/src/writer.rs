use bloom::BloomFilter;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::format::{write_bloom_marker, write_data_record, write_index_entry, MAX_KEY_BYTES, MAX_VALUE_BYTES};
use crate::SSTableError;

/// Default bloom filter false positive rate (1%).
pub const DEFAULT_BLOOM_FPR: f64 = 0.01;

/// What a successful [`SSTableWriter::write`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSummary {
    /// Number of key-value pairs in the data file.
    pub entries: usize,
    /// Number of sparse index entries.
    pub index_entries: usize,
    /// Size of the data file in bytes.
    pub data_bytes: u64,
    /// Size of the index file in bytes.
    pub index_bytes: u64,
}

/// Writes a sorted run of key-value pairs to disk as an immutable segment.
///
/// The writer is stateless; all work happens inside the associated functions. The
/// write is crash-safe: both files are first written to `*.tmp` siblings,
/// fsynced, and then atomically renamed to their final paths (data first,
/// index last). A segment only counts once both files exist, so an
/// interrupted write never leaves something that looks like a valid segment.
pub struct SSTableWriter {}

impl SSTableWriter {
    /// Writes `pairs` to `data_path` / `index_path` with a 1% bloom filter.
    ///
    /// Every `sparsity`-th pair (starting with the first) gets an entry in
    /// the sparse index.
    ///
    /// # Errors
    ///
    /// [`SSTableError::InvalidInput`] if `pairs` is empty, not strictly
    /// ascending by key, holds an oversized key or value, or `sparsity` is 0.
    /// [`SSTableError::Io`] on any disk failure; temp files are removed.
    pub fn write(
        pairs: &[(Vec<u8>, Vec<u8>)],
        data_path: &Path,
        index_path: &Path,
        sparsity: usize,
    ) -> Result<SegmentSummary, SSTableError> {
        Self::write_with_fpr(pairs, data_path, index_path, sparsity, DEFAULT_BLOOM_FPR)
    }

    /// Like [`write`](Self::write) with an explicit bloom filter false
    /// positive rate.
    pub fn write_with_fpr(
        pairs: &[(Vec<u8>, Vec<u8>)],
        data_path: &Path,
        index_path: &Path,
        sparsity: usize,
        bloom_fpr: f64,
    ) -> Result<SegmentSummary, SSTableError> {
        Self::validate(pairs, sparsity)?;

        // Build the filter up front so a bad rate fails before touching disk.
        let mut bloom = BloomFilter::new(pairs.len(), bloom_fpr)?;

        let data_tmp = tmp_path(data_path);
        let index_tmp = tmp_path(index_path);

        let result = Self::write_internal(
            pairs, &mut bloom, data_path, index_path, &data_tmp, &index_tmp, sparsity,
        );
        if result.is_err() {
            let _ = fs::remove_file(&data_tmp);
            let _ = fs::remove_file(&index_tmp);
            // A data file without its index is not a segment; don't leave it around.
            if !index_path.exists() {
                let _ = fs::remove_file(data_path);
            }
        }
        result
    }

    fn validate(pairs: &[(Vec<u8>, Vec<u8>)], sparsity: usize) -> Result<(), SSTableError> {
        if pairs.is_empty() {
            return Err(SSTableError::InvalidInput(
                "refusing to write an empty SSTable".to_string(),
            ));
        }
        if sparsity == 0 {
            return Err(SSTableError::InvalidInput("sparsity must be > 0".to_string()));
        }
        if let Some(pos) = pairs.windows(2).position(|w| w[0].0 >= w[1].0) {
            return Err(SSTableError::InvalidInput(format!(
                "keys must be strictly ascending (violated at position {})",
                pos + 1
            )));
        }
        for (key, value) in pairs {
            if key.len() > MAX_KEY_BYTES {
                return Err(SSTableError::InvalidInput(format!(
                    "key too large: {} bytes (max {})",
                    key.len(),
                    MAX_KEY_BYTES
                )));
            }
            if value.len() > MAX_VALUE_BYTES {
                return Err(SSTableError::InvalidInput(format!(
                    "value too large: {} bytes (max {})",
                    value.len(),
                    MAX_VALUE_BYTES
                )));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_internal(
        pairs: &[(Vec<u8>, Vec<u8>)],
        bloom: &mut BloomFilter,
        data_path: &Path,
        index_path: &Path,
        data_tmp: &Path,
        index_tmp: &Path,
        sparsity: usize,
    ) -> Result<SegmentSummary, SSTableError> {
        // Write DATA file, remembering the offset of every `sparsity`-th record.
        let mut data = BufWriter::new(create_truncated(data_tmp)?);
        let mut sparse: Vec<(&[u8], u64)> = Vec::with_capacity(pairs.len() / sparsity + 1);
        let mut offset = 0u64;

        for (i, (key, value)) in pairs.iter().enumerate() {
            if i % sparsity == 0 {
                sparse.push((key.as_slice(), offset));
            }
            bloom.add(key);
            offset += write_data_record(&mut data, key, value)?;
        }
        let data_bytes = offset;
        sync_buffered(data)?;

        // Write INDEX file: sparse entries, marker, bloom filter.
        let mut index = BufWriter::new(create_truncated(index_tmp)?);
        for (key, data_offset) in &sparse {
            write_index_entry(&mut index, key, *data_offset)?;
        }
        write_bloom_marker(&mut index)?;
        bloom.write_to(&mut index)?;
        sync_buffered(index)?;

        // Atomically move into place; the index appearing is what publishes the segment.
        fs::rename(data_tmp, data_path)?;
        fs::rename(index_tmp, index_path)?;

        // Fsync the parent directory so the renames survive a crash.
        if let Some(parent) = index_path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        let index_bytes = fs::metadata(index_path)?.len();
        let summary = SegmentSummary {
            entries: pairs.len(),
            index_entries: sparse.len(),
            data_bytes,
            index_bytes,
        };
        info!(
            data = %data_path.display(),
            entries = summary.entries,
            index_entries = summary.index_entries,
            data_bytes,
            "wrote segment"
        );
        Ok(summary)
    }
}

/// `foo.sst` -> `foo.sst.tmp`
fn tmp_path(path: &Path) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn create_truncated(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

/// Flushes the `BufWriter`, then syncs the underlying file.
fn sync_buffered(mut w: BufWriter<File>) -> io::Result<()> {
    w.flush()?;
    w.into_inner().map_err(io::Error::from)?.sync_all()
}
