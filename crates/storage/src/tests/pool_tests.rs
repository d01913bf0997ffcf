use crate::pool::{SegmentPool, DEFAULT_MAX_IDLE_SECS};
use common::ErrorCode;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn seed_segment(dir: &std::path::Path, id: u16, timestamp: i64) {
    fs::write(dir.join(segment::generate(id, "segment", timestamp)), b"data").unwrap();
}

#[test]
fn get_opens_and_caches_handle() {
    let dir = tempdir().unwrap();
    seed_segment(dir.path(), 1, 100);

    let pool = SegmentPool::new(dir.path().to_path_buf(), "segment".to_string(), 60);
    assert!(pool.is_empty());

    let first = pool.get(1, 100).unwrap();
    assert_eq!(pool.len(), 1);

    // A second get is a cache hit on the same underlying handle.
    let second = pool.get(1, 100).unwrap();
    assert_eq!(pool.len(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn missing_segment_is_a_storage_error() {
    let dir = tempdir().unwrap();
    let pool = SegmentPool::new(dir.path().to_path_buf(), "segment".to_string(), 60);

    let err = pool.get(9, 42).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IoGeneral);
    assert_eq!(err.segment_id(), Some(9));
    assert!(err.path().is_some());
}

#[test]
fn evict_idle_closes_only_stale_handles() {
    let dir = tempdir().unwrap();
    seed_segment(dir.path(), 1, 100);
    seed_segment(dir.path(), 2, 200);

    let pool = SegmentPool::new(dir.path().to_path_buf(), "segment".to_string(), 60);
    pool.get(1, 100).unwrap();
    pool.get(2, 200).unwrap();
    assert_eq!(pool.len(), 2);

    // Only segment 1 goes past the idle limit.
    pool.age_handle(1, 100, 120);
    assert_eq!(pool.evict_idle(), 1);
    assert_eq!(pool.len(), 1);
    assert!(pool.get(2, 200).is_ok());
}

#[test]
fn hit_refreshes_last_used() {
    let dir = tempdir().unwrap();
    seed_segment(dir.path(), 1, 100);

    let pool = SegmentPool::new(dir.path().to_path_buf(), "segment".to_string(), 60);
    pool.get(1, 100).unwrap();
    pool.age_handle(1, 100, 120);

    // The hit restamps the handle, so eviction no longer touches it.
    pool.get(1, 100).unwrap();
    assert_eq!(pool.evict_idle(), 0);
    assert_eq!(pool.len(), 1);
}

#[test]
fn evicted_handle_stays_readable_until_dropped() {
    use std::os::unix::fs::FileExt;

    let dir = tempdir().unwrap();
    seed_segment(dir.path(), 1, 100);

    let pool = SegmentPool::new(dir.path().to_path_buf(), "segment".to_string(), 60);
    let handle = pool.get(1, 100).unwrap();

    pool.age_handle(1, 100, 120);
    assert_eq!(pool.evict_idle(), 1);

    let mut buf = [0u8; 4];
    handle.read_exact_at(&mut buf, 0).unwrap();
    assert_eq!(&buf, b"data");
}

#[test]
fn close_clears_all_handles() {
    let dir = tempdir().unwrap();
    seed_segment(dir.path(), 1, 100);
    seed_segment(dir.path(), 2, 200);

    let pool = SegmentPool::new(dir.path().to_path_buf(), "segment".to_string(), 60);
    pool.get(1, 100).unwrap();
    pool.get(2, 200).unwrap();

    pool.close();
    assert!(pool.is_empty());

    // The pool reopens segments on demand after close.
    assert!(pool.get(1, 100).is_ok());
}

#[test]
fn non_positive_idle_limit_falls_back_to_default() {
    let dir = tempdir().unwrap();
    seed_segment(dir.path(), 1, 100);

    let pool = SegmentPool::new(dir.path().to_path_buf(), "segment".to_string(), 0);
    pool.get(1, 100).unwrap();
    pool.age_handle(1, 100, DEFAULT_MAX_IDLE_SECS - 60);
    assert_eq!(pool.evict_idle(), 0);
    pool.age_handle(1, 100, DEFAULT_MAX_IDLE_SECS + 60);
    assert_eq!(pool.evict_idle(), 1);
}
