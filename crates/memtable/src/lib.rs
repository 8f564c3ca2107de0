use std::collections::HashMap;

/// In-memory write buffer holding the most recent value for each key.
///
/// Backed by a `HashMap` for O(1) amortized `set`/`get`; sorting only happens
/// once, when the table is drained for a flush.
#[derive(Debug, Default)]
pub struct Memtable {
    map: HashMap<Vec<u8>, Vec<u8>>,
    approx_size: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            approx_size: 0,
        }
    }

    /// Inserts or overwrites `key`. Returns the entry count after the insert.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let key_len = key.len();
        let val_len = value.len();
        match self.map.insert(key, value) {
            Some(old) => {
                self.approx_size = self.approx_size.saturating_sub(old.len()) + val_len;
            }
            None => {
                self.approx_size += key_len + val_len;
            }
        }
        self.map.len()
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(|v| v.as_slice())
    }

    /// Iterator over all keys in unspecified order. Each call starts a fresh pass.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.map.keys().map(|k| k.as_slice())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Approximate payload bytes held (keys + values).
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    /// Removes every entry and returns them sorted ascending by key.
    ///
    /// Used by flush. The table is empty when this returns.
    pub fn drain_sorted(&mut self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.approx_size = 0;
        let mut entries: Vec<_> = self.map.drain().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Puts back entries previously returned by [`drain_sorted`](Self::drain_sorted)
    /// after a failed flush. Entries already present are kept as they are newer.
    pub fn restore(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) {
        for (key, value) in entries {
            if !self.map.contains_key(&key) {
                self.set(key, value);
            }
        }
    }
}
