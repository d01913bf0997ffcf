//! Index rebuild from segment files.
//!
//! The index is in-memory only, so on open every segment is scanned in id
//! order and each record is indexed last-write-wins. Rebuilt entries carry
//! no expiry: the on-disk record format has no TTL field.

use common::{Error, ErrorCode, Options, Result};
use index::{Index, RecordLocator};
use storage::SegmentScanner;
use tracing::debug;

/// Scans every segment under the configured directory and populates
/// `index`. Returns the number of records replayed (not unique keys).
pub fn rebuild_index(options: &Options, index: &Index) -> Result<usize> {
    let dir = &options.segment.directory;
    let prefix = &options.segment.prefix;

    let paths = segment::list_segments(dir, prefix).map_err(|e| {
        Error::storage(
            ErrorCode::SystemInternal,
            "failed to list segment files for index rebuild",
        )
        .with_source(e)
        .with_path(dir)
    })?;

    let mut replayed = 0usize;
    for path in paths {
        let segment_id = segment::parse_id(&path, prefix).map_err(|e| {
            Error::storage(
                ErrorCode::SystemInternal,
                "failed to parse id from segment filename",
            )
            .with_source(e)
            .with_path(&path)
        })?;
        let segment_timestamp = segment::parse_timestamp(&path, prefix).map_err(|e| {
            Error::storage(
                ErrorCode::SystemInternal,
                "failed to parse timestamp from segment filename",
            )
            .with_source(e)
            .with_path(&path)
        })?;

        let mut scanner = SegmentScanner::open(&path)?;
        let mut records = 0usize;
        while let Some((offset, record)) = scanner
            .next_record()
            .map_err(|e| e.with_segment_id(segment_id))?
        {
            index.set(
                &record.key,
                RecordLocator {
                    expires_at: 0,
                    offset,
                    segment_timestamp,
                    segment_id,
                },
            );
            records += 1;
        }

        debug!(segment = segment_id, records, "segment replayed into index");
        replayed += records;
    }

    Ok(replayed)
}
