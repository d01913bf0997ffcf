use super::test_options;
use crate::record::{PayloadCodec, ProtobufCodec, RecordHeader};
use crate::{SegmentScanner, Storage, HEADER_SIZE};
use common::ErrorCode;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn active_segment_path(storage: &Storage, opts: &common::Options) -> PathBuf {
    opts.segment.directory.join(segment::generate(
        storage.segment_id(),
        &opts.segment.prefix,
        storage.segment_timestamp(),
    ))
}

#[test]
fn scans_records_in_write_order() {
    let dir = tempdir().unwrap();
    let opts = test_options(dir.path());
    let mut storage = Storage::open(opts.clone()).unwrap();

    let mut expected = Vec::new();
    for i in 0..5 {
        let key = format!("key-{i}").into_bytes();
        let value = format!("value-{i}").into_bytes();
        let (_, offset) = storage.append(&key, &value).unwrap();
        expected.push((offset, key, value));
    }

    let path = active_segment_path(&storage, &opts);
    let mut scanner = SegmentScanner::open(&path).unwrap();
    for (offset, key, value) in &expected {
        let (seen_offset, record) = scanner.next_record().unwrap().unwrap();
        assert_eq!(seen_offset, *offset);
        assert_eq!(&record.key, key);
        assert_eq!(&record.value, value);
    }
    assert!(scanner.next_record().unwrap().is_none());
}

#[test]
fn empty_segment_scans_to_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("segment_00001_1.seg");
    fs::write(&path, b"").unwrap();

    let mut scanner = SegmentScanner::open(&path).unwrap();
    assert!(scanner.next_record().unwrap().is_none());
}

#[test]
fn torn_header_at_tail_ends_scan_cleanly() {
    let dir = tempdir().unwrap();
    let opts = test_options(dir.path());
    let mut storage = Storage::open(opts.clone()).unwrap();
    storage.append(b"k", b"v").unwrap();

    let path = active_segment_path(&storage, &opts);
    drop(storage);

    // A crash mid-append can leave fewer than 17 header bytes at the tail.
    let mut data = fs::read(&path).unwrap();
    data.extend_from_slice(&[0x01, 0x02, 0x03]);
    fs::write(&path, &data).unwrap();

    let mut scanner = SegmentScanner::open(&path).unwrap();
    let (_, record) = scanner.next_record().unwrap().unwrap();
    assert_eq!(record.key, b"k");
    assert!(scanner.next_record().unwrap().is_none());
}

#[test]
fn torn_payload_at_tail_ends_scan_cleanly() {
    let dir = tempdir().unwrap();
    let opts = test_options(dir.path());
    let mut storage = Storage::open(opts.clone()).unwrap();
    storage.append(b"k", b"v").unwrap();

    let path = active_segment_path(&storage, &opts);
    drop(storage);

    // Full header claiming 100 payload bytes, but only 4 made it to disk.
    let codec = ProtobufCodec;
    let payload = codec.encode(b"torn", b"tail").unwrap();
    let header = RecordHeader {
        checksum: 0,
        payload_size: 100,
        timestamp: 0,
        version: 1,
    };
    let mut data = fs::read(&path).unwrap();
    data.extend_from_slice(&header.encode());
    data.extend_from_slice(&payload[..4]);
    fs::write(&path, &data).unwrap();

    let mut scanner = SegmentScanner::open(&path).unwrap();
    assert!(scanner.next_record().unwrap().is_some());
    assert!(scanner.next_record().unwrap().is_none());
}

#[test]
fn corrupt_payload_mid_file_is_an_error() {
    let dir = tempdir().unwrap();
    let opts = test_options(dir.path());
    let mut storage = Storage::open(opts.clone()).unwrap();
    let (first, _) = storage.append(b"first", b"value").unwrap();
    storage.append(b"second", b"value").unwrap();

    let path = active_segment_path(&storage, &opts);
    drop(storage);

    // Flip a payload byte of the first record; the scan must not continue
    // past it, because every later offset would be untrustworthy.
    let mut data = fs::read(&path).unwrap();
    let target = (HEADER_SIZE + first.header.payload_size as u64 - 1) as usize;
    data[target] ^= 0xFF;
    fs::write(&path, &data).unwrap();

    let mut scanner = SegmentScanner::open(&path).unwrap();
    let err = scanner.next_record().unwrap_err();
    assert_eq!(err.code(), ErrorCode::RecordChecksumMismatch);
}

#[test]
fn missing_file_fails_to_open() {
    let err = SegmentScanner::open(std::path::Path::new("/nonexistent/segment_00001_1.seg"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SegmentOpenFailed);
}
