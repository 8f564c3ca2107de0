//! # Bloom Filter
//!
//! A space-efficient probabilistic data structure for set membership testing.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the set
//! (no false negatives), but may occasionally report that a key **is** in the
//! set when it isn't (false positives). The false positive rate depends on the
//! number of bits and hash functions used.
//!
//! ## Usage in lsmkv
//!
//! Every SSTable segment carries a bloom filter built from its full key set at
//! flush time. Point lookups consult it first: a negative answer skips the
//! segment without reading its data file.
//!
//! ## Sizing
//!
//! For `n` expected keys and a target false positive rate `p`:
//!
//! ```text
//! m = ceil(-(n * ln p) / (ln 2)^2)      bits
//! k = round((m / n) * ln 2), k >= 1     hash functions
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(1000, 0.01).unwrap();
//! bf.add(b"hello");
//! assert!(bf.might_contain(b"hello"));
//! ```
use std::io::{self, Cursor, Read, Write};

use thiserror::Error;

/// Size of the serialized header: `num_bits(u64) + num_hashes(u32) + bits_len(u32)`.
pub const HEADER_BYTES: usize = 8 + 4 + 4;

/// Safety cap: a deserialized bit array may not exceed 128 MiB.
const MAX_BLOOM_BYTES: usize = 128 * 1024 * 1024;

/// Errors produced while building or decoding a bloom filter.
#[derive(Debug, Error)]
pub enum BloomError {
    /// The sizing parameters are out of range.
    #[error("invalid bloom filter parameter: {0}")]
    InvalidParameter(String),

    /// The serialized bytes are inconsistent with their header.
    #[error("corrupt bloom filter: {0}")]
    Corrupt(String),

    /// An underlying I/O error while streaming the filter.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A bloom filter backed by a bit vector with `k` seeded hash functions.
///
/// Uses double hashing: `h(i) = h1 + i * h2` where `h1` and `h2` are derived
/// from FNV-1a with two different seeds.
#[derive(Clone, PartialEq, Eq)]
pub struct BloomFilter {
    /// The bit vector storing the filter state.
    bits: Vec<u8>,
    /// Number of bits in the filter (m).
    num_bits: u64,
    /// Number of hash functions (k).
    num_hashes: u32,
}

impl BloomFilter {
    /// Creates an empty bloom filter sized for `expected_items` with the given
    /// target `false_positive_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`BloomError::InvalidParameter`] if `expected_items` is 0 or
    /// `false_positive_rate` is not in `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Result<Self, BloomError> {
        if expected_items == 0 {
            return Err(BloomError::InvalidParameter(
                "expected_items must be > 0".to_string(),
            ));
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(BloomError::InvalidParameter(format!(
                "false_positive_rate must be in (0, 1), got {}",
                false_positive_rate
            )));
        }

        let n = expected_items as f64;
        let ln2 = std::f64::consts::LN_2;

        // m = ceil(-(n * ln p) / (ln 2)^2)
        let m = (-(n * false_positive_rate.ln()) / ln2.powi(2)).ceil() as u64;
        let m = m.max(1);

        // k = round((m / n) * ln 2)
        let k = ((m as f64 / n) * ln2).round() as u32;
        let k = k.max(1);

        Ok(Self {
            bits: vec![0u8; byte_len(m)],
            num_bits: m,
            num_hashes: k,
        })
    }

    /// Adds a key to the filter. Adding the same key twice has no further effect.
    pub fn add(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let bit_idx = self.bit_index(h1, h2, i);
            self.set_bit(bit_idx);
        }
    }

    /// Returns `true` if the key **might** be in the set, `false` if it is
    /// **definitely not** in the set.
    #[must_use]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        (0..self.num_hashes).all(|i| self.get_bit(self.bit_index(h1, h2, i)))
    }

    /// Returns the number of bits in the filter (m).
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Returns the number of hash functions (k).
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Returns the size of the serialized bloom filter in bytes.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        HEADER_BYTES + self.bits.len()
    }

    /// Serializes the filter into a fresh buffer.
    ///
    /// Wire format (all little-endian):
    /// ```text
    /// [num_bits: u64][num_hashes: u32][bits_len: u32][bits: bytes]
    /// ```
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        buf
    }

    /// Decodes a filter from exactly the bytes produced by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`BloomError::Corrupt`] if the buffer is truncated, has trailing
    /// bytes, or its bit-array length disagrees with the encoded `num_bits`.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, BloomError> {
        let mut cursor = Cursor::new(bytes);
        let bf = Self::read_from(&mut cursor)?;
        if cursor.position() as usize != bytes.len() {
            return Err(BloomError::Corrupt(format!(
                "{} trailing bytes after bit array",
                bytes.len() - cursor.position() as usize
            )));
        }
        Ok(bf)
    }

    /// Streams the serialized filter to a writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.num_bits.to_le_bytes())?;
        w.write_all(&self.num_hashes.to_le_bytes())?;
        w.write_all(&(self.bits.len() as u32).to_le_bytes())?;
        w.write_all(&self.bits)?;
        Ok(())
    }

    /// Reads one serialized filter from a reader.
    ///
    /// A short read is reported as [`BloomError::Corrupt`], other read
    /// failures as [`BloomError::Io`].
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, BloomError> {
        let mut buf8 = [0u8; 8];
        let mut buf4 = [0u8; 4];

        read_exact_or_corrupt(r, &mut buf8, "header")?;
        let num_bits = u64::from_le_bytes(buf8);

        read_exact_or_corrupt(r, &mut buf4, "header")?;
        let num_hashes = u32::from_le_bytes(buf4);

        read_exact_or_corrupt(r, &mut buf4, "header")?;
        let bits_len = u32::from_le_bytes(buf4) as usize;

        if num_bits == 0 || num_hashes == 0 {
            return Err(BloomError::Corrupt(format!(
                "invalid parameters: num_bits={} num_hashes={}",
                num_bits, num_hashes
            )));
        }
        if bits_len > MAX_BLOOM_BYTES {
            return Err(BloomError::Corrupt(format!(
                "bloom filter too large: {} bytes",
                bits_len
            )));
        }
        if bits_len != byte_len(num_bits) {
            return Err(BloomError::Corrupt(format!(
                "bit array is {} bytes but num_bits={} needs {}",
                bits_len,
                num_bits,
                byte_len(num_bits)
            )));
        }

        let mut bits = vec![0u8; bits_len];
        read_exact_or_corrupt(r, &mut bits, "bit array")?;

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
        })
    }

    // ---- Internal helpers ----

    /// Double hashing: h(i) = (h1 + i * h2) mod num_bits.
    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }

    fn set_bit(&mut self, idx: u64) {
        let byte_idx = (idx / 8) as usize;
        let bit_offset = (idx % 8) as u8;
        self.bits[byte_idx] |= 1 << bit_offset;
    }

    fn get_bit(&self, idx: u64) -> bool {
        let byte_idx = (idx / 8) as usize;
        let bit_offset = (idx % 8) as u8;
        (self.bits[byte_idx] >> bit_offset) & 1 == 1
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("bytes", &self.bits.len())
            .finish()
    }
}

fn byte_len(num_bits: u64) -> usize {
    num_bits.div_ceil(8) as usize
}

fn read_exact_or_corrupt<R: Read>(r: &mut R, buf: &mut [u8], what: &str) -> Result<(), BloomError> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(BloomError::Corrupt(format!("truncated {}", what)))
        }
        Err(e) => Err(BloomError::Io(e)),
    }
}

/// Computes two independent 64-bit hashes using FNV-1a with different seeds.
///
/// `h2` is forced odd so consecutive probes never collapse onto one bit.
fn hash_pair(key: &[u8]) -> (u64, u64) {
    let h1 = fnv1a_64(key, 0xcbf29ce484222325);
    let h2 = fnv1a_64(key, 0x517cc1b727220a95) | 1;
    (h1, h2)
}

/// FNV-1a 64-bit hash with a configurable starting basis.
fn fnv1a_64(data: &[u8], basis: u64) -> u64 {
    const FNV_PRIME: u64 = 0x00000100000001b3;
    let mut hash = basis;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
