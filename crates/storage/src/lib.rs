//! # Storage — the append-only segmented log
//!
//! Owns the single active (appendable) segment file, the binary record
//! codec, and the pool of read-only handles for historical segments.
//!
//! ## Segment layout
//!
//! ```text
//! {segment_dir}/
//!   segment_00001_{created_ns}.seg   <- sealed, read via the handle pool
//!   segment_00002_{created_ns}.seg   <- sealed
//!   segment_00003_{created_ns}.seg   <- active, O_APPEND writer
//! ```
//!
//! Each segment is a sequence of records in arrival order (see [`record`]
//! for the framing). Segments are append-only; once rotated away from they
//! are immutable and only ever opened read-only.
//!
//! ## Write path
//!
//! `append` captures the current offset, frames the record, writes header
//! then payload to the active fd, and advances the tracked offset. A short
//! payload write is an error, never retried. When `rotate_on_write` is
//! enabled and the record would not fit, the active segment is fsynced and
//! a fresh one with the next id is opened first.
//!
//! ## Read path
//!
//! `read` resolves the source file (active fd or pooled handle), reads the
//! 17-byte header at the given offset, validates it, reads the payload
//! (exact-size positional read below 1 MiB, chunked streaming above),
//! decodes it, and verifies the key and CRC before returning. All reads are
//! positional (`pread`), so they never disturb the append position of the
//! active descriptor.

mod pool;
pub mod record;
mod scanner;

pub use pool::{SegmentPool, DEFAULT_MAX_IDLE_SECS};
pub use record::{PayloadCodec, ProtobufCodec, Record, RecordHeader, HEADER_SIZE};
pub use scanner::SegmentScanner;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::path::Path;
use std::sync::Arc;

use common::checksum::{Checksummer, Crc32Ieee};
use common::options::{self, Options};
use common::{clock, error, Error, ErrorCode, Result};
use tracing::{debug, info};

/// Payloads at or above this size stream through a chunked reader instead
/// of a single exact-size positional read.
const LARGE_PAYLOAD_THRESHOLD: u32 = 1024 * 1024;

/// Chunk size used by the streaming payload reader.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// File-based storage for segment records.
#[derive(Debug)]
pub struct Storage {
    options: Arc<Options>,
    active: File,
    active_segment_id: u16,
    active_created_at: i64,
    current_offset: u64,
    pool: SegmentPool,
    checksummer: Crc32Ieee,
    codec: ProtobufCodec,
}

impl Storage {
    /// Opens the storage system, creating the segment directory and either
    /// adopting the most recent segment or starting a fresh one.
    ///
    /// Discovery has three outcomes:
    /// 1. no segments exist — start segment 1 at offset 0;
    /// 2. the last segment is already at or past the size limit — rotate to
    ///    `last_id + 1` at offset 0;
    /// 3. the last segment has room — adopt it, with the offset set to its
    ///    current size and the creation timestamp parsed from its filename.
    pub fn open(options: Arc<Options>) -> Result<Self> {
        let segment_dir = options.segment.directory.clone();
        let prefix = options.segment.prefix.clone();

        create_segment_dir(&segment_dir)?;
        info!(
            dir = %segment_dir.display(),
            prefix = %prefix,
            max_segment_size = options.segment.size,
            "initializing storage"
        );

        let last = segment::last_segment(&segment_dir, &prefix).map_err(|e| {
            Error::storage(
                ErrorCode::SystemInternal,
                "failed to discover existing segments during initialization",
            )
            .with_source(e)
            .with_path(&segment_dir)
        })?;

        let (segment_id, created_at, offset, is_new) = match last {
            None => {
                debug!("no existing segments found, starting fresh");
                (1u16, clock::unix_nanos(), 0u64, true)
            }
            Some(path) => {
                let last_id = parse_segment_field(&path, &prefix, segment::parse_id)?;
                let size = fs::metadata(&path)
                    .map_err(|e| {
                        Error::storage(
                            ErrorCode::SystemInternal,
                            "failed to stat most recent segment file",
                        )
                        .with_source(e)
                        .with_path(&path)
                    })?
                    .len();

                if size >= options.segment.size {
                    let next_id = last_id.checked_add(1).ok_or_else(|| {
                        Error::storage(ErrorCode::SystemInternal, "segment id space exhausted")
                            .with_segment_id(last_id)
                    })?;
                    debug!(
                        full_segment = last_id,
                        size,
                        next_id,
                        "most recent segment is full, rotating at open"
                    );
                    (next_id, clock::unix_nanos(), 0, true)
                } else {
                    let created_at = parse_segment_field(&path, &prefix, segment::parse_timestamp)?;
                    debug!(
                        segment = last_id,
                        offset = size,
                        remaining = options.segment.size - size,
                        "continuing with existing segment"
                    );
                    (last_id, created_at, size, false)
                }
            }
        };

        let active = open_segment_file(&segment_dir, &prefix, segment_id, created_at, is_new)?;
        let pool = SegmentPool::new(segment_dir, prefix, DEFAULT_MAX_IDLE_SECS);

        info!(
            segment = segment_id,
            offset,
            is_new_segment = is_new,
            "storage initialized with offset tracking"
        );

        Ok(Self {
            options,
            active,
            active_segment_id: segment_id,
            active_created_at: created_at,
            current_offset: offset,
            pool,
            checksummer: Crc32Ieee::new(),
            codec: ProtobufCodec,
        })
    }

    /// Id of the active segment.
    pub fn segment_id(&self) -> u16 {
        self.active_segment_id
    }

    /// Creation timestamp (nanoseconds) of the active segment.
    pub fn segment_timestamp(&self) -> i64 {
        self.active_created_at
    }

    /// Next append position within the active segment.
    pub fn offset(&self) -> u64 {
        self.current_offset
    }

    /// Appends a key-value pair to the active segment, returning the framed
    /// record and the byte offset its header was written at.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(Record, u64)> {
        let (record, payload) = self.prepare_record(key, value)?;

        if self.options.segment.rotate_on_write
            && self.current_offset > 0
            && self.current_offset + HEADER_SIZE + payload.len() as u64 > self.options.segment.size
        {
            self.rotate()?;
        }

        let record_offset = self.current_offset;
        self.write_record(&record, &payload)?;
        self.current_offset += HEADER_SIZE + payload.len() as u64;

        debug!(
            segment = self.active_segment_id,
            offset = record_offset,
            payload_size = record.header.payload_size,
            "record appended"
        );
        Ok((record, record_offset))
    }

    /// Reads one record back from the segment identified by
    /// `(segment_id, segment_timestamp)` starting at `offset`.
    pub fn read(
        &self,
        key: &[u8],
        segment_id: u16,
        segment_timestamp: i64,
        offset: u64,
    ) -> Result<Record> {
        let pooled: Option<Arc<File>> = if segment_id == self.active_segment_id {
            None
        } else {
            Some(self.pool.get(segment_id, segment_timestamp)?)
        };
        let file: &File = pooled.as_deref().unwrap_or(&self.active);

        let mut header_buf = [0u8; HEADER_SIZE as usize];
        file.read_exact_at(&mut header_buf, offset).map_err(|e| {
            let (code, message) = if e.kind() == io::ErrorKind::UnexpectedEof {
                (
                    ErrorCode::SegmentUnexpectedEof,
                    "reached end of file while reading record header",
                )
            } else {
                (
                    ErrorCode::RecordHeaderReadFailed,
                    "failed to read record header from segment file",
                )
            };
            Error::storage(code, message)
                .with_source(e)
                .with_offset(offset)
                .with_segment_id(segment_id)
        })?;

        let header = RecordHeader::decode(&header_buf)?;
        header
            .validate()
            .map_err(|e| e.with_offset(offset).with_segment_id(segment_id))?;

        let payload_offset = offset + HEADER_SIZE;
        let payload = if header.payload_size < LARGE_PAYLOAD_THRESHOLD {
            read_small_payload(file, payload_offset, header.payload_size)
        } else {
            read_large_payload(file, payload_offset, header.payload_size)
        }
        .map_err(|e| e.with_segment_id(segment_id))?;

        let (decoded_key, decoded_value) = self
            .codec
            .decode(&payload)
            .map_err(|e| e.with_offset(offset).with_segment_id(segment_id))?;

        if decoded_key != key {
            return Err(Error::validation(
                ErrorCode::RecordKeyMismatch,
                "retrieved key does not match requested key",
            )
            .with_offset(offset)
            .with_segment_id(segment_id)
            .with_key(key));
        }

        // Re-encode the decoded record and compare against the stored CRC.
        // The codec is deterministic, so this reproduces the hashed bytes.
        let reencoded = self.codec.encode(&decoded_key, &decoded_value).map_err(|e| {
            Error::storage(
                ErrorCode::RecordSerialization,
                "failed to re-encode payload for checksum verification",
            )
            .with_source(e)
        })?;
        if !self.checksummer.verify(&reencoded, header.checksum) {
            return Err(Error::validation(
                ErrorCode::RecordChecksumMismatch,
                "record checksum validation failed, data may be corrupted",
            )
            .with_offset(offset)
            .with_segment_id(segment_id));
        }

        Ok(Record {
            header,
            key: decoded_key,
            value: decoded_value,
        })
    }

    /// Closes idle pooled handles; see [`SegmentPool::evict_idle`].
    pub fn evict_idle_handles(&self) -> usize {
        self.pool.evict_idle()
    }

    /// Flushes the active segment to disk and releases pooled handles.
    ///
    /// The active descriptor itself is released when the `Storage` value is
    /// dropped; a failed fsync is reported before that happens.
    pub fn close(&mut self) -> Result<()> {
        let file_name = self.active_file_name();
        let path = self.options.segment.directory.join(&file_name);
        info!(file = %file_name, "closing storage");

        let sync_result = self
            .active
            .sync_all()
            .map_err(|e| error::classify_sync_error(e, &file_name, &path));
        self.pool.close();
        sync_result?;

        info!(file = %file_name, "storage closed");
        Ok(())
    }

    fn active_file_name(&self) -> String {
        segment::generate(
            self.active_segment_id,
            &self.options.segment.prefix,
            self.active_created_at,
        )
    }

    /// Frames a key-value pair: encodes the payload and fills in the header
    /// with its size, checksum, write timestamp, and schema version.
    fn prepare_record(&self, key: &[u8], value: &[u8]) -> Result<(Record, Vec<u8>)> {
        let payload = self.codec.encode(key, value).map_err(|e| {
            Error::storage(
                ErrorCode::RecordPreparationFailed,
                "failed to prepare record for storage",
            )
            .with_source(e)
            .with_segment_id(self.active_segment_id)
            .with_path(&self.options.segment.directory)
        })?;

        let header = RecordHeader {
            checksum: self.checksummer.calculate(&payload),
            payload_size: payload.len() as u32,
            timestamp: clock::unix_seconds(),
            version: options::CURRENT_SCHEMA_VERSION,
        };

        let record = Record {
            header,
            key: key.to_vec(),
            value: value.to_vec(),
        };
        Ok((record, payload))
    }

    /// Writes a prepared record to the active segment: header first, then
    /// the payload in a single write call. A partial payload write is
    /// surfaced as an error and never retried.
    fn write_record(&mut self, record: &Record, payload: &[u8]) -> Result<()> {
        self.active.write_all(&record.header.encode()).map_err(|e| {
            Error::storage(ErrorCode::RecordHeaderWriteFailed, "failed to write record header")
                .with_source(e)
                .with_file_name(self.active_file_name())
                .with_segment_id(self.active_segment_id)
                .with_path(&self.options.segment.directory)
        })?;

        let written = self.active.write(payload).map_err(|e| {
            Error::storage(
                ErrorCode::RecordPayloadWriteFailed,
                "failed to write record payload",
            )
            .with_source(e)
            .with_file_name(self.active_file_name())
            .with_segment_id(self.active_segment_id)
            .with_path(&self.options.segment.directory)
        })?;

        if written != payload.len() {
            return Err(Error::storage(
                ErrorCode::IoWriteFailed,
                format!(
                    "short write: {} written, expected {}",
                    options::format_bytes(written as u64),
                    options::format_bytes(payload.len() as u64),
                ),
            )
            .with_file_name(self.active_file_name())
            .with_segment_id(self.active_segment_id)
            .with_provided(written as u64)
            .with_expected(payload.len() as u64));
        }

        Ok(())
    }

    /// Seals the active segment and opens a fresh one with the next id.
    fn rotate(&mut self) -> Result<()> {
        let next_id = self.active_segment_id.checked_add(1).ok_or_else(|| {
            Error::storage(ErrorCode::SystemInternal, "segment id space exhausted")
                .with_segment_id(self.active_segment_id)
        })?;

        let file_name = self.active_file_name();
        let path = self.options.segment.directory.join(&file_name);
        self.active
            .sync_all()
            .map_err(|e| error::classify_sync_error(e, &file_name, &path))?;

        let created_at = clock::unix_nanos();
        let active = open_segment_file(
            &self.options.segment.directory,
            &self.options.segment.prefix,
            next_id,
            created_at,
            true,
        )?;

        info!(
            sealed = self.active_segment_id,
            sealed_size = self.current_offset,
            next = next_id,
            "rotating active segment"
        );

        self.active = active;
        self.active_segment_id = next_id;
        self.active_created_at = created_at;
        self.current_offset = 0;
        Ok(())
    }
}

/// Ensures the segment directory exists with 0755 permissions. The explicit
/// re-chmod covers pre-existing directories created with a tighter mask.
fn create_segment_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| error::classify_dir_error(e, path))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| error::classify_dir_error(e, path))?;
    Ok(())
}

/// Opens a segment file for appending and positions the descriptor at end
/// of file.
fn open_segment_file(
    dir: &Path,
    prefix: &str,
    segment_id: u16,
    timestamp: i64,
    is_new: bool,
) -> Result<File> {
    let file_name = segment::generate(segment_id, prefix, timestamp);
    let path = dir.join(&file_name);

    let mut open_options = OpenOptions::new();
    open_options.read(true).append(true);
    if is_new {
        open_options.create(true);
    }

    let mut file = open_options
        .open(&path)
        .map_err(|e| error::classify_open_error(e, &path, &file_name))?;

    // O_APPEND already directs writes to the end; the explicit seek is a
    // sanity positioning for a descriptor shared by reads and appends.
    file.seek(SeekFrom::End(0)).map_err(|e| {
        Error::storage(ErrorCode::IoSeekFailed, "failed to seek to end of segment file")
            .with_source(e)
            .with_path(&path)
            .with_file_name(&file_name)
    })?;

    debug!(file = %file_name, is_new_segment = is_new, "segment file opened");
    Ok(file)
}

fn parse_segment_field<T>(
    path: &Path,
    prefix: &str,
    parse: impl Fn(&Path, &str) -> std::result::Result<T, segment::NameError>,
) -> Result<T> {
    parse(path, prefix).map_err(|e| {
        Error::storage(
            ErrorCode::SystemInternal,
            "failed to parse metadata from segment filename",
        )
        .with_source(e)
        .with_path(path)
    })
}

/// Single exact-size positional read for payloads under the streaming
/// threshold.
fn read_small_payload(file: &File, offset: u64, size: u32) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; size as usize];
    file.read_exact_at(&mut buf, offset).map_err(|e| {
        let (code, message) = if e.kind() == io::ErrorKind::UnexpectedEof {
            (
                ErrorCode::SegmentUnexpectedEof,
                "reached end of file while reading record payload",
            )
        } else {
            (ErrorCode::RecordPayloadReadFailed, "failed to read record payload")
        };
        Error::storage(code, message)
            .with_source(e)
            .with_offset(offset)
            .with_expected(size as u64)
    })?;
    Ok(buf)
}

/// Chunked positional reads into a buffer pre-grown to the expected size,
/// for payloads at or above the streaming threshold.
fn read_large_payload(file: &File, offset: u64, size: u32) -> Result<Vec<u8>> {
    let expected = size as usize;
    let mut buf = Vec::with_capacity(expected);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    while buf.len() < expected {
        let want = (expected - buf.len()).min(READ_CHUNK_SIZE);
        let read = match file.read_at(&mut chunk[..want], offset + buf.len() as u64) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::storage(
                    ErrorCode::RecordPayloadReadFailed,
                    "failed to read record payload",
                )
                .with_source(e)
                .with_offset(offset)
                .with_expected(size as u64)
                .with_provided(buf.len() as u64));
            }
        };
        if read == 0 {
            return Err(Error::storage(
                ErrorCode::SegmentUnexpectedEof,
                "reached end of file while reading record payload",
            )
            .with_offset(offset)
            .with_expected(size as u64)
            .with_provided(buf.len() as u64));
        }
        buf.extend_from_slice(&chunk[..read]);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests;
