//! Sequential segment reader used to rebuild the index at open.
//!
//! Walks one segment file record by record, verifying each payload's CRC as
//! it goes. A torn record at the tail of the file (a partial header, or a
//! header whose payload extends past end of file) ends the scan cleanly —
//! that is what a crash mid-append leaves behind. Corruption anywhere else
//! is an error: framing is offset-based, so a bad record makes every
//! subsequent offset untrustworthy.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use common::checksum::{Checksummer, Crc32Ieee};
use common::{Error, ErrorCode, Result};
use tracing::warn;

use crate::record::{PayloadCodec, ProtobufCodec, Record, RecordHeader, HEADER_SIZE};

/// Iterates over the records of a single segment file in write order.
#[derive(Debug)]
pub struct SegmentScanner {
    path: PathBuf,
    file: File,
    len: u64,
    offset: u64,
    checksummer: Crc32Ieee,
    codec: ProtobufCodec,
}

impl SegmentScanner {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::storage(ErrorCode::SegmentOpenFailed, "failed to open segment file for scan")
                .with_source(e)
                .with_path(path)
        })?;
        let len = file
            .metadata()
            .map_err(|e| {
                Error::storage(ErrorCode::SystemInternal, "failed to stat segment file for scan")
                    .with_source(e)
                    .with_path(path)
            })?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            offset: 0,
            checksummer: Crc32Ieee::new(),
            codec: ProtobufCodec,
        })
    }

    /// Returns the next record and the offset its header starts at, or
    /// `None` once the segment is exhausted.
    pub fn next_record(&mut self) -> Result<Option<(u64, Record)>> {
        if self.offset + HEADER_SIZE > self.len {
            if self.offset < self.len {
                warn!(
                    path = %self.path.display(),
                    offset = self.offset,
                    "segment ends with a torn record header, ignoring tail"
                );
            }
            return Ok(None);
        }

        let mut header_buf = [0u8; HEADER_SIZE as usize];
        self.file
            .read_exact_at(&mut header_buf, self.offset)
            .map_err(|e| {
                Error::storage(
                    ErrorCode::RecordHeaderReadFailed,
                    "failed to read record header during segment scan",
                )
                .with_source(e)
                .with_offset(self.offset)
                .with_path(&self.path)
            })?;

        let header = RecordHeader::decode(&header_buf)?;
        header
            .validate()
            .map_err(|e| e.with_offset(self.offset).with_path(&self.path))?;

        let payload_offset = self.offset + HEADER_SIZE;
        if payload_offset + header.payload_size as u64 > self.len {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                payload_size = header.payload_size,
                "segment ends with a torn record payload, ignoring tail"
            );
            return Ok(None);
        }

        let mut payload = vec![0u8; header.payload_size as usize];
        self.file
            .read_exact_at(&mut payload, payload_offset)
            .map_err(|e| {
                Error::storage(
                    ErrorCode::RecordPayloadReadFailed,
                    "failed to read record payload during segment scan",
                )
                .with_source(e)
                .with_offset(payload_offset)
                .with_path(&self.path)
            })?;

        if !self.checksummer.verify(&payload, header.checksum) {
            return Err(Error::validation(
                ErrorCode::RecordChecksumMismatch,
                "record checksum validation failed during segment scan",
            )
            .with_offset(self.offset)
            .with_path(&self.path));
        }

        let (key, value) = self
            .codec
            .decode(&payload)
            .map_err(|e| e.with_offset(self.offset).with_path(&self.path))?;

        let record_offset = self.offset;
        self.offset = payload_offset + header.payload_size as u64;

        Ok(Some((record_offset, Record { header, key, value })))
    }
}
