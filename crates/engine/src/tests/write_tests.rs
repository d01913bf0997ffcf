use super::helpers::{open_db, segment_files, test_options_with_segment_size};
use crate::Db;
use common::checksum::{Checksummer, Crc32Ieee};
use common::{Category, ErrorCode};
use std::fs;
use storage::record::PayloadCodec;
use storage::{ProtobufCodec, HEADER_SIZE};
use tempfile::tempdir;

// -------------------- Write-read roundtrip --------------------

#[test]
fn set_then_get_roundtrip() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    db.set(b"user:1", b"alice").unwrap();
    let record = db.get(b"user:1").unwrap();

    assert_eq!(record.key, b"user:1");
    assert_eq!(record.value, b"alice");
    assert_eq!(record.header.version, 1);

    // The stored checksum is CRC32/IEEE over the encoded payload bytes.
    let payload = ProtobufCodec.encode(b"user:1", b"alice").unwrap();
    assert_eq!(record.header.checksum, Crc32Ieee::new().calculate(&payload));
    assert_eq!(record.header.payload_size as usize, payload.len());

    // Exactly one segment file exists, holding one header + one payload.
    let files = segment_files(dir.path());
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("segment_00001_"));
    assert!(name.ends_with(".seg"));
    assert_eq!(
        fs::metadata(&files[0]).unwrap().len(),
        HEADER_SIZE + payload.len() as u64
    );
}

#[test]
fn overwrite_shadows_prior_value() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    db.set(b"user:1", b"alice").unwrap();
    let first_size = fs::metadata(&segment_files(dir.path())[0]).unwrap().len();

    db.set(b"user:1", b"bob").unwrap();
    assert_eq!(db.get(b"user:1").unwrap().value, b"bob");
    assert_eq!(db.key_count(), 1);

    // The first record still exists on disk; the file grew.
    let second_size = fs::metadata(&segment_files(dir.path())[0]).unwrap().len();
    assert!(second_size > first_size);
}

#[test]
fn delete_then_get_misses() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    db.set(b"user:1", b"alice").unwrap();
    assert!(db.delete(b"user:1").unwrap());

    let err = db.get(b"user:1").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.code(), ErrorCode::IndexKeyNotFound);

    // Deleting again reports absence.
    assert!(!db.delete(b"user:1").unwrap());
}

#[test]
fn distinct_keys_are_independent() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    for i in 0..100 {
        db.set(format!("key-{i}").as_bytes(), format!("value-{i}").as_bytes())
            .unwrap();
    }
    assert_eq!(db.key_count(), 100);

    for i in (0..100).rev() {
        let record = db.get(format!("key-{i}").as_bytes()).unwrap();
        assert_eq!(record.value, format!("value-{i}").as_bytes());
    }
}

// -------------------- Mid-run rotation --------------------

#[test]
fn writes_rotate_into_new_segments() {
    let dir = tempdir().unwrap();
    let db = Db::open(
        "engine-tests",
        test_options_with_segment_size(dir.path(), 128),
    )
    .unwrap();

    for i in 0..12 {
        db.set(format!("key-{i:02}").as_bytes(), b"0123456789abcdef").unwrap();
    }
    assert!(db.active_segment_id() > 1);
    assert!(segment_files(dir.path()).len() > 1);

    // Keys in sealed segments are still readable through the handle pool.
    for i in 0..12 {
        let record = db.get(format!("key-{i:02}").as_bytes()).unwrap();
        assert_eq!(record.value, b"0123456789abcdef");
    }
}

// -------------------- Input validation --------------------

#[test]
fn empty_key_is_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let err = db.set(b"", b"value").unwrap_err();
    assert_eq!(err.category(), Category::Validation);
    assert_eq!(err.code(), ErrorCode::ValidationInvalidData);
}

#[test]
fn empty_value_is_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let err = db.set(b"key", b"").unwrap_err();
    assert_eq!(err.category(), Category::Validation);
}

#[test]
fn oversized_key_is_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let key = vec![b'k'; common::options::MAX_KEY_SIZE + 1];
    let err = db.set(&key, b"value").unwrap_err();
    assert_eq!(err.category(), Category::Validation);

    // Nothing was written.
    assert_eq!(db.key_count(), 0);
    assert_eq!(fs::metadata(&segment_files(dir.path())[0]).unwrap().len(), 0);
}

#[test]
fn max_size_key_is_accepted() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let key = vec![b'k'; common::options::MAX_KEY_SIZE];
    db.set(&key, b"value").unwrap();
    assert_eq!(db.get(&key).unwrap().value, b"value");
}

#[test]
fn validation_applies_to_reads_too() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    assert_eq!(
        db.get(b"").unwrap_err().category(),
        Category::Validation
    );
    assert_eq!(
        db.delete(b"").unwrap_err().category(),
        Category::Validation
    );
}
