use super::{segment_paths, sorted_pairs};
use crate::*;
use anyhow::Result;
use std::fs::{self, OpenOptions};
use tempfile::tempdir;

// -------------------- Lookups --------------------

#[test]
fn get_finds_every_key_across_blocks() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    let pairs = sorted_pairs(35);
    SSTableWriter::write(&pairs, &data, &index, 10)?;

    let reader = SSTableReader::open(&data, &index)?;
    assert_eq!(reader.sparse_index().len(), 4);
    for (key, value) in &pairs {
        assert_eq!(reader.get(key)?.as_deref(), Some(value.as_slice()));
    }
    Ok(())
}

#[test]
fn get_missing_keys_returns_none() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    SSTableWriter::write(&sorted_pairs(35), &data, &index, 10)?;
    let reader = SSTableReader::open(&data, &index)?;

    // Before the first key, between keys, inside the last block and past the end.
    assert!(reader.get(b"a")?.is_none());
    assert!(reader.get(b"key0055")?.is_none());
    assert!(reader.get(b"key033x")?.is_none());
    assert!(reader.get(b"zzz")?.is_none());
    assert!(reader.get(b"")?.is_none());
    Ok(())
}

#[test]
fn get_with_sparsity_larger_than_segment() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    let pairs = sorted_pairs(5);
    SSTableWriter::write(&pairs, &data, &index, 100)?;

    let reader = SSTableReader::open(&data, &index)?;
    assert_eq!(reader.sparse_index().len(), 1);
    assert_eq!(reader.sparse_index()[0].1, 0);
    for (key, value) in &pairs {
        assert_eq!(reader.get(key)?.as_deref(), Some(value.as_slice()));
    }
    Ok(())
}

#[test]
fn get_single_entry_segment() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "one");
    SSTableWriter::write(&[(b"only".to_vec(), b"v".to_vec())], &data, &index, 10)?;

    let reader = SSTableReader::open(&data, &index)?;
    assert_eq!(reader.get(b"only")?, Some(b"v".to_vec()));
    assert!(reader.get(b"onlz")?.is_none());
    Ok(())
}

#[test]
fn get_empty_value_and_binary_keys() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "bin");
    let pairs = vec![
        (vec![0x00], vec![]),
        (vec![0x00, 0xff], vec![1, 2, 3]),
        (vec![0x7f], b"mid".to_vec()),
        (vec![0xff, 0xfe], vec![0xde, 0xad]),
    ];
    SSTableWriter::write(&pairs, &data, &index, 2)?;

    let reader = SSTableReader::open(&data, &index)?;
    for (key, value) in &pairs {
        assert_eq!(reader.get(key)?.as_deref(), Some(value.as_slice()));
    }
    Ok(())
}

#[test]
fn reader_exposes_bloom_and_lengths() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    let pairs = sorted_pairs(20);
    let summary = SSTableWriter::write(&pairs, &data, &index, 5)?;

    let reader = SSTableReader::open(&data, &index)?;
    assert_eq!(reader.data_len(), summary.data_bytes);
    assert_eq!(reader.data_path(), data.as_path());
    assert_eq!(reader.index_path(), index.as_path());
    for (key, _) in &pairs {
        assert!(reader.bloom().might_contain(key));
    }
    let debug = format!("{:?}", reader);
    assert!(debug.contains("index_entries: 4"));
    Ok(())
}

#[test]
fn bloom_rejected_key_never_touches_data_file() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    let pairs = sorted_pairs(35);
    SSTableWriter::write(&pairs, &data, &index, 10)?;
    let reader = SSTableReader::open(&data, &index)?;

    // Sorts inside the segment's key range, so only the filter can skip the read.
    let rejected = (0..1000)
        .map(|i| format!("key{:03}x", i).into_bytes())
        .find(|k| !reader.bloom().might_contain(k))
        .expect("filter rejects at least one absent key");

    // Pull the data out from under the open reader.
    OpenOptions::new().write(true).open(&data)?.set_len(0)?;

    assert!(reader.get(&rejected)?.is_none());
    let err = reader.get(&pairs[12].0).unwrap_err();
    assert!(matches!(err, SSTableError::Corrupt(_)), "got {:?}", err);
    Ok(())
}

#[test]
fn concurrent_gets_share_one_reader() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    let pairs = sorted_pairs(200);
    SSTableWriter::write(&pairs, &data, &index, 16)?;
    let reader = SSTableReader::open(&data, &index)?;

    std::thread::scope(|s| {
        for t in 0..4 {
            let reader = &reader;
            let pairs = &pairs;
            s.spawn(move || {
                for (key, value) in pairs.iter().skip(t).step_by(4) {
                    assert_eq!(reader.get(key).unwrap().as_deref(), Some(value.as_slice()));
                }
            });
        }
    });
    Ok(())
}

// -------------------- Corruption --------------------

#[test]
fn open_without_bloom_marker_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    SSTableWriter::write(&sorted_pairs(3), &data, &index, 10)?;

    // Keep only the single index entry; drop the marker and filter.
    let bytes = fs::read(&index)?;
    let entry_len = 4 + b"key000".len() + 8;
    fs::write(&index, &bytes[..entry_len])?;

    let err = SSTableReader::open(&data, &index).unwrap_err();
    assert!(matches!(err, SSTableError::Corrupt(_)), "got {:?}", err);
    assert!(err.to_string().contains("marker"));
    Ok(())
}

#[test]
fn open_with_damaged_marker_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    SSTableWriter::write(&sorted_pairs(3), &data, &index, 10)?;

    let mut bytes = fs::read(&index)?;
    let marker_at = 4 + b"key000".len() + 8 + 4;
    bytes[marker_at] ^= 0xFF;
    fs::write(&index, &bytes)?;

    let err = SSTableReader::open(&data, &index).unwrap_err();
    assert!(matches!(err, SSTableError::Corrupt(_)));
    Ok(())
}

#[test]
fn open_with_truncated_bloom_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    SSTableWriter::write(&sorted_pairs(10), &data, &index, 10)?;

    let bytes = fs::read(&index)?;
    fs::write(&index, &bytes[..bytes.len() - 3])?;

    let err = SSTableReader::open(&data, &index).unwrap_err();
    assert!(matches!(err, SSTableError::Corrupt(_)));
    Ok(())
}

#[test]
fn open_with_empty_index_file_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    SSTableWriter::write(&sorted_pairs(3), &data, &index, 10)?;
    fs::write(&index, b"")?;

    assert!(matches!(
        SSTableReader::open(&data, &index),
        Err(SSTableError::Corrupt(_))
    ));
    Ok(())
}

#[test]
fn open_missing_files_is_io_error() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "absent");
    assert!(matches!(
        SSTableReader::open(&data, &index),
        Err(SSTableError::Io(_))
    ));
    Ok(())
}

#[test]
fn truncated_data_file_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    let pairs = sorted_pairs(35);
    SSTableWriter::write(&pairs, &data, &index, 10)?;

    // Cut the data file in the middle of the last block.
    let len = fs::metadata(&data)?.len();
    OpenOptions::new().write(true).open(&data)?.set_len(len - 5)?;

    match SSTableReader::open(&data, &index) {
        Err(err) => assert!(matches!(err, SSTableError::Corrupt(_))),
        Ok(reader) => {
            let err = reader.get(&pairs[34].0).unwrap_err();
            assert!(matches!(err, SSTableError::Corrupt(_)), "got {:?}", err);
            // Earlier blocks are intact.
            assert_eq!(reader.get(&pairs[0].0)?.as_deref(), Some(pairs[0].1.as_slice()));
        }
    }
    Ok(())
}

#[test]
fn data_file_shorter_than_last_offset_fails_open() -> Result<()> {
    let dir = tempdir()?;
    let (data, index) = segment_paths(dir.path(), "seg");
    SSTableWriter::write(&sorted_pairs(35), &data, &index, 10)?;

    // Leave only the first record; the index still points at three more blocks.
    OpenOptions::new().write(true).open(&data)?.set_len(10)?;

    let err = SSTableReader::open(&data, &index).unwrap_err();
    assert!(matches!(err, SSTableError::Corrupt(_)));
    Ok(())
}
