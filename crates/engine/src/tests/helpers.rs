use crate::EngineConfig;
use std::fs;
use std::path::Path;

/// Config rooted at `dir` with the given capacity; fsync off to keep tests fast.
pub fn config(dir: &Path, capacity: usize) -> EngineConfig {
    EngineConfig::new(dir)
        .with_capacity(capacity)
        .with_wal_sync(false)
}

/// Counts files in `dir` with extension `ext`.
pub fn count_files(dir: &Path, ext: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|x| x == ext)
                .unwrap_or(false)
        })
        .count()
}
