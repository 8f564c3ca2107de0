//! Segment binary format constants and record read/write helpers.
//!
//! ## Data record
//!
//! ```text
//! [key_len: u32 LE][val_len: u32 LE][key][value]
//! ```
//!
//! ## Index entry
//!
//! ```text
//! [key_len: u32 LE][key][data_offset: u64 LE]
//! ```
//!
//! ## Separator between index entries and the bloom filter
//!
//! ```text
//! [0xFFFF_FFFF: u32 LE]["BLOOMSEP"]
//! ```

use bloom::BloomFilter;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::SSTableError;

/// Key-length value that introduces the bloom marker instead of an index entry.
pub const INDEX_MARKER_TAG: u32 = u32::MAX;

/// Literal bytes following [`INDEX_MARKER_TAG`].
pub const BLOOM_MARKER: &[u8; 8] = b"BLOOMSEP";

/// Size of a data record header: `key_len(u32) + val_len(u32)`.
pub const DATA_HEADER_BYTES: u64 = 4 + 4;

/// Maximum key size we'll allocate during reads (64 KiB). Prevents OOM on corrupt files.
pub const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size we'll allocate during reads (10 MiB). Prevents OOM on corrupt files.
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// Writes one data record and returns the number of bytes written.
pub fn write_data_record<W: Write>(w: &mut W, key: &[u8], value: &[u8]) -> io::Result<u64> {
    w.write_u32::<LittleEndian>(key.len() as u32)?;
    w.write_u32::<LittleEndian>(value.len() as u32)?;
    w.write_all(key)?;
    w.write_all(value)?;
    Ok(DATA_HEADER_BYTES + key.len() as u64 + value.len() as u64)
}

/// Reads a data record header, returning `(key_len, val_len)`.
pub fn read_data_header<R: Read>(r: &mut R) -> io::Result<(usize, usize)> {
    let key_len = r.read_u32::<LittleEndian>()? as usize;
    let val_len = r.read_u32::<LittleEndian>()? as usize;
    Ok((key_len, val_len))
}

/// Writes one sparse index entry.
pub fn write_index_entry<W: Write>(w: &mut W, key: &[u8], offset: u64) -> io::Result<()> {
    w.write_u32::<LittleEndian>(key.len() as u32)?;
    w.write_all(key)?;
    w.write_u64::<LittleEndian>(offset)?;
    Ok(())
}

/// Writes the separator that ends the sparse index.
pub fn write_bloom_marker<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_u32::<LittleEndian>(INDEX_MARKER_TAG)?;
    w.write_all(BLOOM_MARKER)?;
    Ok(())
}

/// Decodes a whole index file into its sparse entries and bloom filter.
///
/// # Errors
///
/// [`SSTableError::Corrupt`] if the input ends before the marker, the marker
/// bytes are wrong, an entry is malformed, or the filter fails to decode.
pub fn decode_index(bytes: &[u8]) -> Result<(Vec<(Vec<u8>, u64)>, BloomFilter), SSTableError> {
    let mut r = bytes;
    let mut entries = Vec::new();

    loop {
        let key_len = r
            .read_u32::<LittleEndian>()
            .map_err(|_| SSTableError::Corrupt("bloom marker missing from index".to_string()))?;

        if key_len == INDEX_MARKER_TAG {
            let mut marker = [0u8; 8];
            r.read_exact(&mut marker)
                .map_err(|_| SSTableError::Corrupt("truncated bloom marker".to_string()))?;
            if &marker != BLOOM_MARKER {
                return Err(SSTableError::Corrupt("bad bloom marker".to_string()));
            }
            break;
        }

        let key_len = key_len as usize;
        if key_len > MAX_KEY_BYTES {
            return Err(SSTableError::Corrupt(format!(
                "index key_len {} exceeds maximum {}",
                key_len, MAX_KEY_BYTES
            )));
        }
        if r.len() < key_len + 8 {
            return Err(SSTableError::Corrupt("truncated index entry".to_string()));
        }
        let (key, rest) = r.split_at(key_len);
        r = rest;
        let offset = r.read_u64::<LittleEndian>()?;
        entries.push((key.to_vec(), offset));
    }

    let bloom = BloomFilter::deserialize(r)?;
    Ok((entries, bloom))
}
