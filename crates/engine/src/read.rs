/// Read path: `get()` and `keys()`.
///
/// Point lookups check the memtable first (freshest data), then segments
/// newest-first. The first match wins, so a newer segment shadows older ones.
use tracing::debug;

use crate::{Engine, Result};

impl Engine {
    /// Looks up a key, returning its most recent value.
    ///
    /// `Ok(None)` means the key is in neither the Memtable nor any segment.
    ///
    /// # Errors
    ///
    /// [`Error::EngineClosed`](crate::Error::EngineClosed) after close;
    /// [`Error::Corrupt`](crate::Error::Corrupt) or
    /// [`Error::Io`](crate::Error::Io) if a segment read fails.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;

        // 1. Memtable
        if let Some(value) = self.mem.get(key) {
            return Ok(Some(value.to_vec()));
        }

        // 2. Segments, newest -> oldest
        for segment in &self.segments {
            if let Some(value) = segment.reader.get(key)? {
                debug!(segment = segment.id, "segment hit");
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Keys currently buffered in the Memtable, ascending.
    ///
    /// Flushed keys are not listed; they live only in segments.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        self.ensure_open()?;
        let mut keys: Vec<Vec<u8>> = self.mem.keys().map(<[u8]>::to_vec).collect();
        keys.sort_unstable();
        Ok(keys)
    }
}
