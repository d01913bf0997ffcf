//! Write path: `set()`, `set_with_ttl()`, and `delete()`.
//!
//! Mutations go to storage first; the index is only updated once the record
//! is safely appended, so a failed write never leaves the index pointing at
//! bytes that were not written. Deletes are index-only — disk-level
//! tombstoning belongs to compaction, which is not part of the core.

use std::time::Duration;

use common::{clock, Result};
use index::RecordLocator;
use storage::Record;
use tracing::debug;

use crate::Engine;

impl Engine {
    /// Stores a key-value pair and indexes it without an expiry.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;

        let (_, offset) = self.storage.append(key, value)?;
        self.index.set(
            key,
            RecordLocator {
                expires_at: 0,
                offset,
                segment_timestamp: self.storage.segment_timestamp(),
                segment_id: self.storage.segment_id(),
            },
        );

        debug!(
            key_len = key.len(),
            value_len = value.len(),
            offset,
            segment = self.storage.segment_id(),
            "set completed"
        );
        Ok(())
    }

    /// Stores a key-value pair that expires `ttl` after the write.
    ///
    /// The expiry lives only in the index: records on disk carry no TTL, so
    /// an expired key's bytes remain in its segment until compaction.
    pub fn set_with_ttl(&mut self, key: &[u8], value: &[u8], ttl: Duration) -> Result<Record> {
        self.ensure_open()?;

        let (record, offset) = self.storage.append(key, value)?;
        let ttl_ns = i64::try_from(ttl.as_nanos()).unwrap_or(i64::MAX);
        let expires_at = clock::unix_nanos().saturating_add(ttl_ns);

        self.index.set(
            key,
            RecordLocator {
                expires_at,
                offset,
                segment_timestamp: self.storage.segment_timestamp(),
                segment_id: self.storage.segment_id(),
            },
        );

        debug!(key_len = key.len(), ?ttl, expires_at, "set with ttl completed");
        Ok(record)
    }

    /// Removes the key from the index, reporting whether it was present.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;

        let deleted = self.index.delete(key);
        debug!(key_len = key.len(), deleted, "delete completed");
        Ok(deleted)
    }
}
