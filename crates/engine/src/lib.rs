//! # Engine — the EmberKV coordinator
//!
//! Ties the [`storage`] log and the [`index`] map into a complete
//! Bitcask-style key-value store.
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌─────────────────────────────────────────────┐
//! │                   Db                        │
//! │  input validation + instance-wide RwLock    │
//! ├─────────────────────────────────────────────┤
//! │                 ENGINE                      │
//! │                                             │
//! │ write.rs → storage.append → index.set       │
//! │ read.rs  → index.get → storage.read         │
//! │ recovery.rs → segment scan → index rebuild  │
//! │                                             │
//! │ closed flag checked on every operation      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module       | Purpose                                          |
//! |--------------|--------------------------------------------------|
//! | `lib.rs`     | `Engine` struct, constructor, close, maintenance |
//! | [`write`]    | `set()`, `set_with_ttl()`, `delete()`            |
//! | [`read`]     | `get()`, `exists()`                              |
//! | [`recovery`] | index rebuild from segment files at open         |
//! | [`db`]       | public `Db` facade with validation + outer lock  |
//!
//! ## Durability
//!
//! Writes land in the active segment immediately but are fsynced only on
//! rotation and on close. On-disk record order equals write arrival order.
//! Deletes are index-only: the record stays on disk until a future
//! compaction pass reclaims it.

mod db;
mod read;
mod recovery;
mod write;

pub use db::Db;
pub use recovery::rebuild_index;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{Error, ErrorCode, Options, Result};
use index::Index;
use storage::Storage;
use tracing::info;

/// The database engine coordinating the index and storage subsystems.
#[derive(Debug)]
pub struct Engine {
    closed: AtomicBool,
    index: Index,
    storage: Storage,
}

impl Engine {
    /// Opens the engine: brings up storage (creating or adopting segments),
    /// then rebuilds the in-memory index from every record on disk.
    pub fn new(options: Arc<Options>) -> Result<Self> {
        let storage = Storage::open(Arc::clone(&options))?;
        let index = Index::new();

        let restored = rebuild_index(&options, &index)?;
        info!(
            records = restored,
            keys = index.len(),
            segment = storage.segment_id(),
            "engine opened"
        );

        Ok(Self {
            closed: AtomicBool::new(false),
            index,
            storage,
        })
    }

    /// Number of live keys in the index.
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Id of the segment currently accepting appends.
    pub fn active_segment_id(&self) -> u16 {
        self.storage.segment_id()
    }

    /// Removes every expired entry from the index.
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.index.cleanup_expired())
    }

    /// Closes pooled handles for historical segments that have sat idle.
    pub fn evict_idle_handles(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.storage.evict_idle_handles())
    }

    /// Shuts the engine down: flips the closed flag (rejecting a second
    /// close), clears the index, and flushes storage.
    pub fn close(&mut self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::storage(
                ErrorCode::EngineClosed,
                "cannot access closed engine",
            ));
        }

        self.index.close();
        self.storage.close()?;
        info!("engine closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::storage(
                ErrorCode::EngineClosed,
                "cannot access closed engine",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
