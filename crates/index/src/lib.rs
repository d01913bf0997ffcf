//! # Index — in-memory key → locator map
//!
//! The index gives the engine O(1) point lookups: each live key maps to a
//! [`RecordLocator`] holding everything needed to read the key's most recent
//! record back from disk (segment id, segment creation timestamp, byte
//! offset, optional expiry).
//!
//! Entries with a TTL are removed lazily when a lookup finds them expired,
//! or in batch via [`Index::cleanup_expired`]. All expiry arithmetic is in
//! nanoseconds since the unix epoch.

use std::collections::HashMap;

use common::clock;
use parking_lot::RwLock;
use tracing::debug;

/// Points at one record inside one segment file.
///
/// `expires_at` is nanoseconds since the unix epoch; `0` means the entry
/// never expires. `segment_timestamp` is kept alongside the id because both
/// are needed to reconstruct the owning segment's filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocator {
    pub expires_at: i64,
    pub offset: u64,
    pub segment_timestamp: i64,
    pub segment_id: u16,
}

impl RecordLocator {
    pub fn is_expired(&self, now_ns: i64) -> bool {
        self.expires_at != 0 && now_ns > self.expires_at
    }
}

/// Concurrent map from key bytes to record locators.
#[derive(Debug, Default)]
pub struct Index {
    entries: RwLock<HashMap<Vec<u8>, RecordLocator>>,
}

impl Index {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(2048)),
        }
    }

    /// Inserts or overwrites the locator for `key`.
    pub fn set(&self, key: &[u8], locator: RecordLocator) {
        self.entries.write().insert(key.to_vec(), locator);
    }

    /// Looks up `key`, lazily evicting it if its TTL has passed.
    pub fn get(&self, key: &[u8]) -> Option<RecordLocator> {
        let now = clock::unix_nanos();

        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(locator) if !locator.is_expired(now) => return Some(*locator),
                Some(_) => {}
            }
        }

        // The entry was expired under the read lock; re-check under the
        // write lock in case a concurrent set replaced it.
        let mut entries = self.entries.write();
        if let Some(locator) = entries.get(key) {
            if !locator.is_expired(now) {
                return Some(*locator);
            }
            entries.remove(key);
            debug!(key_len = key.len(), "evicted expired index entry");
        }
        None
    }

    /// Removes the entry for `key`, reporting whether it was present.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Sweeps the whole map, removing every expired entry. Returns the
    /// number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = clock::unix_nanos();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, locator| !locator.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "expired entry cleanup completed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clears the map and releases its allocation.
    pub fn close(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        entries.shrink_to_fit();
    }
}
