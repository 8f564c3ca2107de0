use bloom::BloomError;
use std::io;
use thiserror::Error;

/// Errors produced while writing or reading a segment.
#[derive(Debug, Error)]
pub enum SSTableError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The files on disk do not match the segment format.
    #[error("corrupt sstable: {0}")]
    Corrupt(String),

    /// The caller handed the writer something it cannot persist.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<BloomError> for SSTableError {
    fn from(e: BloomError) -> Self {
        match e {
            BloomError::InvalidParameter(msg) => SSTableError::InvalidInput(msg),
            BloomError::Corrupt(msg) => SSTableError::Corrupt(format!("bloom filter: {}", msg)),
            BloomError::Io(e) => SSTableError::Io(e),
        }
    }
}
