//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk segments for the lsmkv storage engine.
//!
//! When the in-memory memtable reaches its capacity the engine flushes a
//! sorted snapshot of it to disk as one segment. Segments are *write-once,
//! read-many*; nothing ever modifies them after the flush that created them.
//!
//! ## Segment layout
//!
//! A segment is a pair of files:
//!
//! ```text
//! <name>.sst   DATA FILE
//! ┌───────────────────────────────────────────────────────────────┐
//! │ key_len (u32) | val_len (u32) | key | value                   │
//! │ ... repeated for each entry, strictly ascending by key ...    │
//! └───────────────────────────────────────────────────────────────┘
//!
//! <name>.index INDEX FILE
//! ┌───────────────────────────────────────────────────────────────┐
//! │ SPARSE INDEX (every `sparsity`-th entry, starting at entry 0)  │
//! │ key_len (u32) | key | data_offset (u64)                        │
//! ├───────────────────────────────────────────────────────────────┤
//! │ MARKER  0xFFFF_FFFF (u32) | "BLOOMSEP"                         │
//! ├───────────────────────────────────────────────────────────────┤
//! │ BLOOM FILTER                                                   │
//! │ num_bits (u64) | num_hashes (u32) | bits_len (u32) | bits      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. A key length of `u32::MAX` can never be a
//! real key, which is what makes the marker unambiguous.
//!
//! ## Lookups
//!
//! The reader keeps the sparse index and the bloom filter in memory. A lookup
//! consults the bloom filter, binary-searches the sparse index for the block
//! that could hold the key, and scans at most `sparsity` records of that block.

mod error;
mod format;
mod reader;
mod writer;

pub use error::SSTableError;
pub use format::{BLOOM_MARKER, DATA_HEADER_BYTES, INDEX_MARKER_TAG, MAX_KEY_BYTES, MAX_VALUE_BYTES};
pub use reader::SSTableReader;
pub use writer::{SSTableWriter, SegmentSummary, DEFAULT_BLOOM_FPR};

#[cfg(test)]
mod tests;
