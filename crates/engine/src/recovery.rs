/// Cold-start path: WAL replay, segment discovery and temp file cleanup.
use memtable::Memtable;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing::{info, warn};
use wal::{WalError, WalReader};

use crate::segment::{self, Segment, SegmentFile, TMP_SUFFIX};
use crate::Result;

/// Replays the WAL at `path` into `mem`, returning the number of records
/// applied.
///
/// A missing WAL is a fresh start. Replay ends at the first truncated or
/// corrupt record; everything before it is applied and the file is truncated
/// to that record's offset.
///
/// # Errors
///
/// Propagates genuine I/O errors from the reader.
pub(crate) fn replay_wal(path: &Path, mem: &mut Memtable) -> Result<usize> {
    let mut reader = match WalReader::open(path) {
        Ok(reader) => reader,
        Err(WalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut applied = 0usize;
    for record in reader.by_ref() {
        let record = record?;
        mem.set(record.key, record.value);
        applied += 1;
    }

    if let Some(offset) = reader.stopped_at() {
        drop(reader);
        // Cut the bad tail so records appended from now on stay reachable.
        OpenOptions::new().write(true).open(path)?.set_len(offset)?;
        warn!(
            path = %path.display(),
            offset,
            applied,
            "WAL replay stopped at a bad record; log truncated there"
        );
    } else if applied > 0 {
        info!(path = %path.display(), applied, "WAL replayed");
    }
    Ok(applied)
}

/// Opens every complete segment in `dir`, returning them newest-first along
/// with the id the next flush should use.
///
/// A segment is complete when both its data and index file exist. A lone
/// data or index file is left in place, logged, and skipped; its id is still
/// never reused.
pub(crate) fn load_segments(dir: &Path) -> Result<(Vec<Segment>, u64)> {
    // id -> (has data, has index)
    let mut found: BTreeMap<u64, (bool, bool)> = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some((id, kind)) = segment::parse_file_name(name) {
            let slot = found.entry(id).or_insert((false, false));
            match kind {
                SegmentFile::Data => slot.0 = true,
                SegmentFile::Index => slot.1 = true,
            }
        }
    }

    let next_id = found.keys().next_back().map_or(1, |max| max + 1);

    // Oldest first, then reversed so reads see the newest segment first.
    let mut segments = Vec::with_capacity(found.len());
    for (id, files) in found {
        match files {
            (true, true) => segments.push(Segment::open(dir, id)?),
            (true, false) => warn!(segment = id, "data file without index; ignored"),
            (false, true) => warn!(segment = id, "index file without data; ignored"),
            (false, false) => {}
        }
    }
    segments.reverse();

    Ok((segments, next_id))
}

/// Removes leftover `*.tmp` files from interrupted flushes.
pub(crate) fn cleanup_tmp_files(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let p = entry.path();
            if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
                if name.ends_with(TMP_SUFFIX) && p.is_file() {
                    warn!(path = %p.display(), "removing leftover temp file");
                    let _ = fs::remove_file(&p);
                }
            }
        }
    }
}
