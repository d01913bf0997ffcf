//! Public embedded-store facade.
//!
//! [`Db`] is what applications hold. It validates inputs before they reach
//! the engine and serializes access with one instance-wide reader-writer
//! lock: writes, deletes, and close take the write side; reads take the
//! read side. The engine and storage layers below assume exactly this
//! exclusion — in particular, at most one writer touches the active segment
//! at a time.
//!
//! ## Example
//!
//! ```no_run
//! use engine::Db;
//! use common::Options;
//!
//! let db = Db::open("orders", Options::default().with_data_dir("/tmp/orders")).unwrap();
//! db.set(b"user:1", b"alice").unwrap();
//! let record = db.get(b"user:1").unwrap();
//! assert_eq!(record.value, b"alice");
//! db.close().unwrap();
//! ```

use std::time::Duration;

use common::options::{self, Options};
use common::{Error, ErrorCode, Result};
use parking_lot::RwLock;
use storage::Record;
use tracing::info;

use crate::Engine;

/// A running EmberKV instance.
#[derive(Debug)]
pub struct Db {
    engine: RwLock<Engine>,
}

impl Db {
    /// Opens (or creates) the store described by `options`. The `service`
    /// name only labels log output.
    pub fn open(service: &str, options: Options) -> Result<Self> {
        if options.segment.prefix.trim().is_empty() {
            return Err(Error::validation(
                ErrorCode::SystemInvalidInput,
                "segment prefix must not be empty",
            ));
        }
        if options.segment.directory.as_os_str().is_empty() {
            return Err(Error::validation(
                ErrorCode::SystemInvalidInput,
                "segment directory must not be empty",
            ));
        }
        if options.data_dir.as_os_str().is_empty() {
            return Err(Error::validation(
                ErrorCode::SystemInvalidInput,
                "data directory must not be empty",
            ));
        }

        let data_dir = options.data_dir.display().to_string();
        let max_segment_size = options.segment.size;
        let engine = Engine::new(std::sync::Arc::new(options))?;

        info!(
            service,
            data_dir, max_segment_size, "emberkv instance initialized"
        );
        Ok(Self {
            engine: RwLock::new(engine),
        })
    }

    /// Stores a key-value pair.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        self.engine.write().set(key, value)
    }

    /// Stores a key-value pair that expires `ttl` after the write.
    pub fn set_with_ttl(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        if ttl.is_zero() {
            return Err(Error::validation(
                ErrorCode::ValidationInvalidData,
                format!("ttl must be positive, got {ttl:?}"),
            ));
        }
        self.engine.write().set_with_ttl(key, value, ttl).map(|_| ())
    }

    /// Retrieves the most recent record for `key`. A missing (or expired)
    /// key is an error with code `INDEX_KEY_NOT_FOUND`; see
    /// [`Error::is_not_found`].
    pub fn get(&self, key: &[u8]) -> Result<Record> {
        validate_key(key)?;
        self.engine.read().get(key)
    }

    /// Reports whether `key` is live, without reading its value from disk.
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        validate_key(key)?;
        self.engine.read().exists(key)
    }

    /// Removes `key`, reporting whether it was present.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        validate_key(key)?;
        self.engine.write().delete(key)
    }

    /// Sweeps expired entries out of the index. Returns how many were
    /// removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.engine.write().cleanup_expired()
    }

    /// Closes idle file handles held for historical segments. Returns how
    /// many were released.
    pub fn evict_idle_handles(&self) -> Result<usize> {
        self.engine.write().evict_idle_handles()
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        self.engine.read().key_count()
    }

    /// Id of the segment currently accepting appends.
    pub fn active_segment_id(&self) -> u16 {
        self.engine.read().active_segment_id()
    }

    /// Flushes and shuts the store down. A second close is an error with
    /// code `ENGINE_CLOSED`, as is any operation after this returns.
    pub fn close(&self) -> Result<()> {
        self.engine.write().close()
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::validation(
            ErrorCode::ValidationInvalidData,
            "key must not be empty",
        )
        .with_provided(0)
        .with_expected(1));
    }

    if key.len() > options::MAX_KEY_SIZE {
        return Err(Error::validation(
            ErrorCode::ValidationInvalidData,
            format!(
                "key size {} exceeds maximum allowed size of {}",
                options::format_bytes(key.len() as u64),
                options::format_bytes(options::MAX_KEY_SIZE as u64),
            ),
        )
        .with_provided(key.len() as u64)
        .with_expected(options::MAX_KEY_SIZE as u64));
    }

    Ok(())
}

fn validate_value(value: &[u8]) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(
            ErrorCode::ValidationInvalidData,
            "value must not be empty",
        )
        .with_provided(0)
        .with_expected(1));
    }

    if value.len() > options::MAX_VALUE_SIZE as usize {
        return Err(Error::validation(
            ErrorCode::ValidationInvalidData,
            format!(
                "value size {} exceeds maximum allowed size of {}",
                options::format_bytes(value.len() as u64),
                options::format_bytes(options::MAX_VALUE_SIZE as u64),
            ),
        )
        .with_provided(value.len() as u64)
        .with_expected(options::MAX_VALUE_SIZE as u64));
    }

    Ok(())
}
