use config::ConfigError;
use sstable::SSTableError;
use std::io;
use thiserror::Error;
use wal::WalError;

/// Errors returned by [`Engine`](crate::Engine) operations.
///
/// A key that is simply absent is not an error; lookups return `Ok(None)`.
///
/// A [`set`](crate::Engine::set) that fills the Memtable and then fails to
/// flush returns the flush error, but its write is already applied and
/// durable (applied, flush pending); the next `set` or `flush` retries.
#[derive(Debug, Error)]
pub enum Error {
    /// A disk read, write, or sync failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Files on disk do not match their format.
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Bad configuration or an argument the engine cannot store.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The engine was closed; no further operations are accepted.
    #[error("engine is closed")]
    EngineClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<WalError> for Error {
    fn from(e: WalError) -> Self {
        match e {
            WalError::Io(e) => Error::Io(e),
            WalError::RecordTooLarge(n) => {
                Error::InvalidParameter(format!("record too large for the WAL: {} bytes", n))
            }
        }
    }
}

impl From<SSTableError> for Error {
    fn from(e: SSTableError) -> Self {
        match e {
            SSTableError::Io(e) => Error::Io(e),
            SSTableError::Corrupt(msg) => Error::Corrupt(msg),
            SSTableError::InvalidInput(msg) => Error::InvalidParameter(msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidParameter(msg) => Error::InvalidParameter(msg),
        }
    }
}
