/// Segment file naming and the in-memory segment registry entry.
///
/// Segment `id` lives in two files inside the database directory:
/// `sst-{id:020}.sst` (data) and `sst-{id:020}.index` (index). Zero padding
/// keeps lexical and numeric order identical.
use sstable::{SSTableError, SSTableReader};
use std::path::{Path, PathBuf};

const PREFIX: &str = "sst-";
pub(crate) const DATA_EXT: &str = "sst";
pub(crate) const INDEX_EXT: &str = "index";
pub(crate) const TMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentFile {
    Data,
    Index,
}

pub(crate) fn data_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{:020}.{}", PREFIX, id, DATA_EXT))
}

pub(crate) fn index_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{:020}.{}", PREFIX, id, INDEX_EXT))
}

/// Parses `sst-<id>.sst` / `sst-<id>.index`. Anything else is `None`.
pub(crate) fn parse_file_name(name: &str) -> Option<(u64, SegmentFile)> {
    let rest = name.strip_prefix(PREFIX)?;
    let (id, ext) = rest.split_once('.')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let kind = match ext {
        DATA_EXT => SegmentFile::Data,
        INDEX_EXT => SegmentFile::Index,
        _ => return None,
    };
    Some((id.parse().ok()?, kind))
}

/// An open segment in the read path.
pub(crate) struct Segment {
    pub(crate) id: u64,
    pub(crate) reader: SSTableReader,
}

impl Segment {
    pub(crate) fn open(dir: &Path, id: u64) -> Result<Self, SSTableError> {
        let reader = SSTableReader::open(data_path(dir, id), index_path(dir, id))?;
        Ok(Self { id, reader })
    }
}
