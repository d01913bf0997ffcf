//! Read path: `get()` and `exists()`.
//!
//! Lookups resolve the key through the index first; only a hit touches
//! disk. An index miss — including a lazily-expired TTL entry — is the
//! typed `INDEX_KEY_NOT_FOUND` error, which callers treat as non-fatal.

use common::{Error, ErrorCode, Result};
use storage::Record;
use tracing::debug;

use crate::Engine;

impl Engine {
    /// Retrieves the most recent record for `key`.
    pub fn get(&self, key: &[u8]) -> Result<Record> {
        self.ensure_open()?;

        let locator = self.index.get(key).ok_or_else(|| {
            Error::index(ErrorCode::IndexKeyNotFound, "key not found in index").with_key(key)
        })?;

        debug!(
            key_len = key.len(),
            segment = locator.segment_id,
            offset = locator.offset,
            "index lookup hit"
        );

        self.storage.read(
            key,
            locator.segment_id,
            locator.segment_timestamp,
            locator.offset,
        )
    }

    /// Reports whether `key` is live in the index, without reading disk.
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.index.get(key).is_some())
    }
}
