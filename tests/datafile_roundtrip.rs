//! Integration tests covering the container-level properties and seed
//! scenarios: round-tripping items and blobs through `Writer` and
//! `DataFile`, type grouping, lazy caching, and legacy magic tolerance.

use datafile_rs::codec::header::{Header, Version, HEADER_SIZE};
use datafile_rs::codec::{DataFile, Writer};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write as _};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "datafile-rs-it-{name}-{:?}.datafile",
        std::thread::current().id()
    ))
}

struct Cleanup(PathBuf);
impl Drop for Cleanup {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

/// S1: an empty container is exactly 36 bytes and reads back with every
/// count at zero.
#[test]
fn s1_minimal_empty_file_is_header_sized_and_reads_back_empty() {
    let path = temp_path("s1");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.finish(&path).unwrap();

    let metadata = fs::metadata(&path).unwrap();
    assert_eq!(metadata.len() as usize, HEADER_SIZE);

    let datafile = DataFile::open(&path).unwrap();
    assert_eq!(datafile.num_items(), 0);
    assert_eq!(datafile.num_data(), 0);
    assert_eq!(datafile.num_item_types(), 0);

    let mut file = fs::File::open(&path).unwrap();
    let header = Header::read(&mut file).unwrap();
    assert_eq!(header.version, Version::V4);
    assert_eq!(header.num_item_types, 0);
    assert_eq!(header.num_items, 0);
    assert_eq!(header.num_raw_data, 0);
    assert_eq!(header.item_size, 0);
    assert_eq!(header.data_size, 0);
    // size = file_size - 16, swaplen = (file_size - data_size) - 16; an
    // empty container's 36-byte file has 20 bytes past the 16-byte prefix.
    assert_eq!(header.size, 20);
    assert_eq!(header.swaplen, 20);
}

/// S2: a single item round-trips with its type, id and payload intact.
#[test]
fn s2_single_item_round_trips() {
    let path = temp_path("s2");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_item(7, 42, &[0x01, 0x02, 0x03, 0x04]).unwrap();
    writer.finish(&path).unwrap();

    let datafile = DataFile::open(&path).unwrap();
    assert_eq!(datafile.num_items(), 1);
    let (item_type, id, payload) = datafile.get_item(0).unwrap();
    assert_eq!(item_type, 7);
    assert_eq!(id, 42);
    assert_eq!(payload, &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(datafile.get_item_size(0).unwrap(), 4);

    let indices = datafile.get_type(7);
    assert_eq!(indices, vec![0]);
}

/// S3: a single blob round-trips through compression, and its size is
/// knowable before it's loaded.
#[test]
fn s3_single_blob_round_trips_through_compression() {
    let path = temp_path("s3");
    let _cleanup = Cleanup(path.clone());

    let blob = vec![0u8; 16];
    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_data(&blob).unwrap();
    writer.finish(&path).unwrap();

    let mut datafile = DataFile::open(&path).unwrap();
    assert_eq!(datafile.num_data(), 1);
    assert_eq!(datafile.get_data_size(0).unwrap(), 16);
    assert_eq!(datafile.get_data(0).unwrap(), blob.as_slice());
    assert_eq!(datafile.get_data_size(0).unwrap(), 16);
}

/// S4: items of different types interleaved on write are grouped by type
/// (in ascending type order) on read, preserving each type's internal
/// insertion order.
#[test]
fn s4_interleaved_types_are_grouped_on_read() {
    let path = temp_path("s4");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_item(5, 0, &[1, 0, 0, 0]).unwrap(); // A #1
    writer.add_item(9, 0, &[2, 0, 0, 0]).unwrap(); // B #1
    writer.add_item(5, 1, &[3, 0, 0, 0]).unwrap(); // A #2
    writer.add_item(3, 0, &[4, 0, 0, 0]).unwrap(); // C #1
    writer.finish(&path).unwrap();

    let datafile = DataFile::open(&path).unwrap();
    let a_indices = datafile.get_type(5);
    assert_eq!(a_indices.len(), 2);
    let (_, id0, payload0) = datafile.get_item(a_indices[0]).unwrap();
    let (_, id1, payload1) = datafile.get_item(a_indices[1]).unwrap();
    assert_eq!((id0, payload0), (0, [1u8, 0, 0, 0].as_slice()));
    assert_eq!((id1, payload1), (1, [3u8, 0, 0, 0].as_slice()));
}

/// S6: a file with the legacy reversed magic `ATAD` opens identically to
/// one with the canonical `DATA` magic.
#[test]
fn s6_legacy_magic_opens_identically() {
    let path = temp_path("s6");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_item(7, 42, &[0x01, 0x02, 0x03, 0x04]).unwrap();
    writer.finish(&path).unwrap();

    {
        let mut file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(b"ATAD").unwrap();
    }

    let datafile = DataFile::open(&path).unwrap();
    let (item_type, id, payload) = datafile.get_item(0).unwrap();
    assert_eq!(item_type, 7);
    assert_eq!(id, 42);
    assert_eq!(payload, &[0x01, 0x02, 0x03, 0x04]);
}

/// Hash determinism: crc32/sha256 reported by an opened file match an
/// independent hash of its bytes.
#[test]
fn hash_matches_independent_digest() {
    let path = temp_path("hash");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_item(1, 0, &[9, 9, 9, 9]).unwrap();
    writer.finish(&path).unwrap();

    let datafile = DataFile::open(&path).unwrap();

    let mut bytes = Vec::new();
    fs::File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes);
    assert_eq!(datafile.crc32(), hasher.finalize());
    assert!(datafile.verify_sha256(&datafile.sha256()));
}

/// Lazy caching: a second `get_data` call returns identical contents
/// without re-reading, and `unload` forces a fresh read.
#[test]
fn lazy_caching_and_unload() {
    let path = temp_path("cache");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_data(b"cached bytes").unwrap();
    writer.finish(&path).unwrap();

    let mut datafile = DataFile::open(&path).unwrap();
    let first = datafile.get_data(0).unwrap().to_vec();
    let second = datafile.get_data(0).unwrap().to_vec();
    assert_eq!(first, second);

    datafile.unload(0);
    let third = datafile.get_data(0).unwrap().to_vec();
    assert_eq!(third, first);
}

/// Replace: a caller-supplied buffer is returned until the next unload.
#[test]
fn replace_overrides_cached_data_until_unload() {
    let path = temp_path("replace");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_data(b"original").unwrap();
    writer.finish(&path).unwrap();

    let mut datafile = DataFile::open(&path).unwrap();
    let _ = datafile.get_data(0).unwrap();
    datafile.replace(0, b"replaced".to_vec());
    assert_eq!(datafile.get_data(0).unwrap(), b"replaced");
}

/// `get_data_size` reports the materialized buffer's length after a
/// `replace` that changes a blob's size, not the header-declared size —
/// this is what the MAP overlay's tile-layer RLE expansion relies on.
#[test]
fn get_data_size_reflects_replaced_buffer_length() {
    let path = temp_path("replace-size");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_data(b"12345678").unwrap();
    writer.finish(&path).unwrap();

    let mut datafile = DataFile::open(&path).unwrap();
    assert_eq!(datafile.get_data_size(0).unwrap(), 8);

    datafile.replace(0, vec![0u8; 32]);
    assert_eq!(datafile.get_data_size(0).unwrap(), 32);

    datafile.unload(0);
    assert_eq!(datafile.get_data_size(0).unwrap(), 8);
}

/// Header `size`/`swaplen` cover the 20 bytes of the header past its
/// first 16 bytes, plus the metadata and (for `size`) data regions —
/// not just the metadata/data regions themselves.
#[test]
fn header_size_and_swaplen_include_the_fixed_20_byte_offset() {
    let path = temp_path("size-swaplen");
    let _cleanup = Cleanup(path.clone());

    let mut writer = Writer::new();
    writer.open().unwrap();
    writer.add_item(1, 0, &[1, 2, 3, 4]).unwrap();
    writer.add_data(b"hello world").unwrap();
    writer.finish(&path).unwrap();

    let mut file = fs::File::open(&path).unwrap();
    let header = Header::read(&mut file).unwrap();

    let file_size = fs::metadata(&path).unwrap().len() as i32;
    assert_eq!(header.size, file_size - 16);
    assert_eq!(header.swaplen, file_size - header.data_size - 16);
}

/// Safety bounds: a negative header count is rejected with `InvalidSize`
/// rather than attempting to allocate or read past the file.
#[test]
fn negative_header_count_is_rejected() {
    let path = temp_path("invalid-size");
    let _cleanup = Cleanup(path.clone());

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"DATA");
    bytes.extend_from_slice(&4i32.to_le_bytes()); // version
    bytes.extend_from_slice(&0i32.to_le_bytes()); // size
    bytes.extend_from_slice(&0i32.to_le_bytes()); // swaplen
    bytes.extend_from_slice(&(-1i32).to_le_bytes()); // num_item_types
    bytes.extend_from_slice(&0i32.to_le_bytes()); // num_items
    bytes.extend_from_slice(&0i32.to_le_bytes()); // num_raw_data
    bytes.extend_from_slice(&0i32.to_le_bytes()); // item_size
    bytes.extend_from_slice(&0i32.to_le_bytes()); // data_size
    fs::write(&path, &bytes).unwrap();

    let err = DataFile::open(&path).unwrap_err();
    assert!(matches!(
        err,
        datafile_rs::Error::Datafile(datafile_rs::DatafileError::InvalidSize)
    ));
}

/// Safety bounds: a header claiming an oversize (but non-negative)
/// `item_size` that pushes the metadata region past 2^31 bytes is
/// rejected with `InvalidSize` rather than attempting to allocate or
/// read that much.
#[test]
fn oversize_metadata_region_is_rejected() {
    let path = temp_path("invalid-size-oversize");
    let _cleanup = Cleanup(path.clone());

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"DATA");
    bytes.extend_from_slice(&4i32.to_le_bytes()); // version
    bytes.extend_from_slice(&0i32.to_le_bytes()); // size
    bytes.extend_from_slice(&0i32.to_le_bytes()); // swaplen
    bytes.extend_from_slice(&1i32.to_le_bytes()); // num_item_types
    bytes.extend_from_slice(&0i32.to_le_bytes()); // num_items
    bytes.extend_from_slice(&0i32.to_le_bytes()); // num_raw_data
    // item_size alone is just under 2^31; the extra 12-byte ItemTypes
    // entry claimed above tips the total metadata region over the cap.
    bytes.extend_from_slice(&i32::MAX.to_le_bytes()); // item_size
    bytes.extend_from_slice(&0i32.to_le_bytes()); // data_size
    fs::write(&path, &bytes).unwrap();

    let err = DataFile::open(&path).unwrap_err();
    assert!(matches!(
        err,
        datafile_rs::Error::Datafile(datafile_rs::DatafileError::InvalidSize)
    ));
}
