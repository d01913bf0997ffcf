use super::helpers::open_db;
use common::{Category, ErrorCode};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn expired_key_misses_and_leaves_the_index() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    db.set_with_ttl(b"k", b"v", Duration::from_millis(1)).unwrap();
    thread::sleep(Duration::from_millis(10));

    let err = db.get(b"k").unwrap_err();
    assert_eq!(err.code(), ErrorCode::IndexKeyNotFound);

    // The lazy eviction removed the entry itself.
    assert_eq!(db.key_count(), 0);
}

#[test]
fn unexpired_ttl_key_reads_normally() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    db.set_with_ttl(b"k", b"v", Duration::from_secs(60)).unwrap();
    assert_eq!(db.get(b"k").unwrap().value, b"v");
    assert!(db.exists(b"k").unwrap());
}

#[test]
fn zero_ttl_is_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let err = db.set_with_ttl(b"k", b"v", Duration::ZERO).unwrap_err();
    assert_eq!(err.category(), Category::Validation);
    assert_eq!(err.code(), ErrorCode::ValidationInvalidData);
    assert_eq!(db.key_count(), 0);
}

#[test]
fn overwrite_without_ttl_clears_expiry() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    db.set_with_ttl(b"k", b"v1", Duration::from_millis(1)).unwrap();
    db.set(b"k", b"v2").unwrap();
    thread::sleep(Duration::from_millis(10));

    assert_eq!(db.get(b"k").unwrap().value, b"v2");
}

#[test]
fn cleanup_expired_sweeps_in_batch() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    db.set_with_ttl(b"short-1", b"v", Duration::from_millis(1)).unwrap();
    db.set_with_ttl(b"short-2", b"v", Duration::from_millis(1)).unwrap();
    db.set_with_ttl(b"long", b"v", Duration::from_secs(60)).unwrap();
    db.set(b"forever", b"v").unwrap();

    thread::sleep(Duration::from_millis(10));
    assert_eq!(db.cleanup_expired().unwrap(), 2);
    assert_eq!(db.key_count(), 2);
    assert!(db.exists(b"long").unwrap());
    assert!(db.exists(b"forever").unwrap());
}
