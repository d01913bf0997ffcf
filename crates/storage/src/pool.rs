//! Handle pool for historical segments.
//!
//! Reads of non-active segments go through a lazy cache of read-only file
//! handles keyed by segment filename. Handles are opened on first use,
//! stamped on every hit, and closed again once idle for longer than
//! `max_idle_secs`.
//!
//! Returned handles are `Arc<File>`: callers may read from them without
//! holding the pool's lock, and a handle evicted mid-read stays alive until
//! the last reader drops it.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use common::{clock, Error, ErrorCode, Result};
use parking_lot::RwLock;
use tracing::{debug, info};

/// Default idle lifetime of a pooled handle (30 minutes).
pub const DEFAULT_MAX_IDLE_SECS: i64 = 30 * 60;

#[derive(Debug)]
struct PooledHandle {
    file: Arc<File>,
    last_used: AtomicI64,
}

/// Lazy, idle-evicting cache of read-only segment file handles.
#[derive(Debug)]
pub struct SegmentPool {
    directory: PathBuf,
    prefix: String,
    max_idle_secs: i64,
    handles: RwLock<HashMap<String, PooledHandle>>,
}

impl SegmentPool {
    pub fn new(directory: PathBuf, prefix: String, max_idle_secs: i64) -> Self {
        let max_idle_secs = if max_idle_secs <= 0 {
            DEFAULT_MAX_IDLE_SECS
        } else {
            max_idle_secs
        };
        Self {
            directory,
            prefix,
            max_idle_secs,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a read-only handle for the given segment, opening it on a
    /// cache miss.
    pub fn get(&self, segment_id: u16, timestamp: i64) -> Result<Arc<File>> {
        let cache_key = segment::generate(segment_id, &self.prefix, timestamp);

        {
            let handles = self.handles.read();
            if let Some(handle) = handles.get(&cache_key) {
                handle.last_used.store(clock::unix_seconds(), Ordering::Relaxed);
                return Ok(Arc::clone(&handle.file));
            }
        }

        let path = self.directory.join(&cache_key);
        let file = File::open(&path).map_err(|e| {
            Error::storage(
                ErrorCode::IoGeneral,
                format!("failed to open segment file {cache_key}"),
            )
            .with_source(e)
            .with_path(&path)
            .with_segment_id(segment_id)
        })?;
        let file = Arc::new(file);
        debug!(segment = segment_id, file = %cache_key, "opened pooled segment handle");

        // Double-checked insert: a racing lookup may have installed a handle
        // while ours was being opened; keep the installed one and drop ours.
        let mut handles = self.handles.write();
        let handle = handles.entry(cache_key).or_insert_with(|| PooledHandle {
            file: Arc::clone(&file),
            last_used: AtomicI64::new(clock::unix_seconds()),
        });
        Ok(Arc::clone(&handle.file))
    }

    /// Closes every handle idle for longer than the configured maximum.
    /// Returns the number of handles evicted.
    pub fn evict_idle(&self) -> usize {
        let now = clock::unix_seconds();
        let mut handles = self.handles.write();
        let before = handles.len();
        handles.retain(|_, handle| now - handle.last_used.load(Ordering::Relaxed) <= self.max_idle_secs);
        let evicted = before - handles.len();
        if evicted > 0 {
            debug!(evicted, remaining = handles.len(), "closed idle segment handles");
        }
        evicted
    }

    /// Number of handles currently cached.
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Closes all handles and clears the pool.
    pub fn close(&self) {
        let mut handles = self.handles.write();
        let released = handles.len();
        handles.clear();
        if released > 0 {
            info!(handles = released, "segment handle pool closed");
        }
    }

    /// Backdates a pooled handle's last-used stamp. Test hook for idle
    /// eviction without sleeping.
    #[cfg(test)]
    pub(crate) fn age_handle(&self, segment_id: u16, timestamp: i64, by_secs: i64) {
        let cache_key = segment::generate(segment_id, &self.prefix, timestamp);
        let handles = self.handles.read();
        if let Some(handle) = handles.get(&cache_key) {
            handle
                .last_used
                .store(clock::unix_seconds() - by_secs, Ordering::Relaxed);
        }
    }
}
