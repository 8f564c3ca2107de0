mod reader_tests;

use std::path::{Path, PathBuf};

/// `(data, index)` paths for a segment named `name` inside `dir`.
pub(crate) fn segment_paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}.sst", name)),
        dir.join(format!("{}.index", name)),
    )
}

/// `count` sorted pairs `key000..` -> `value-000..`.
pub(crate) fn sorted_pairs(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| {
            (
                format!("key{:03}", i).into_bytes(),
                format!("value-{:03}", i).into_bytes(),
            )
        })
        .collect()
}
