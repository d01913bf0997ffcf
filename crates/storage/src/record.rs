//! On-disk record framing.
//!
//! Every record is a fixed 17-byte header followed by a variable-length
//! payload:
//!
//! ```text
//! [checksum: u32 LE][payload_size: u32 LE][timestamp: i64 LE][version: u8]
//! [payload bytes ...]
//! ```
//!
//! - `checksum` — CRC32/IEEE of the payload bytes.
//! - `payload_size` — byte length of the payload that follows.
//! - `timestamp` — seconds since the unix epoch at write time.
//! - `version` — schema version, currently 1.
//!
//! The payload is a protobuf-encoded `{key, value}` pair. Protobuf encoding
//! here is deterministic: fields are emitted in tag order with no map
//! fields, so re-encoding a decoded record reproduces the exact bytes that
//! were checksummed at write time. The checksum verification on the read
//! path depends on that property.

use byteorder::{LittleEndian, ReadBytesExt};
use common::options;
use common::{Error, ErrorCode, Result};
use prost::Message;

/// Width of the record header on disk.
pub const HEADER_SIZE: u64 = 17;

/// Metadata stored in front of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// CRC32/IEEE of the payload bytes.
    pub checksum: u32,
    /// Byte length of the payload.
    pub payload_size: u32,
    /// Write time, seconds since the unix epoch.
    pub timestamp: i64,
    /// Schema version, currently 1.
    pub version: u8,
}

impl RecordHeader {
    /// Serializes the header into its 17-byte little-endian form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf.extend_from_slice(&self.payload_size.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.push(self.version);
        buf
    }

    /// Decodes a header from exactly [`HEADER_SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut reader = buf;
        let read = |r: &mut &[u8]| -> std::io::Result<RecordHeader> {
            Ok(RecordHeader {
                checksum: r.read_u32::<LittleEndian>()?,
                payload_size: r.read_u32::<LittleEndian>()?,
                timestamp: r.read_i64::<LittleEndian>()?,
                version: r.read_u8()?,
            })
        };
        read(&mut reader).map_err(|e| {
            Error::storage(
                ErrorCode::RecordHeaderReadFailed,
                "record header is shorter than the fixed header size",
            )
            .with_source(e)
        })
    }

    /// Sanity checks applied before trusting a header read from disk.
    pub fn validate(&self) -> Result<()> {
        if self.payload_size == 0 {
            return Err(Error::validation(
                ErrorCode::ValidationInvalidData,
                "record header contains zero payload size",
            ));
        }

        if self.payload_size > options::MAX_VALUE_SIZE {
            return Err(Error::validation(
                ErrorCode::RecordPayloadTooLarge,
                format!(
                    "payload size {} exceeds maximum allowed size {}",
                    options::format_bytes(self.payload_size as u64),
                    options::format_bytes(options::MAX_VALUE_SIZE as u64),
                ),
            )
            .with_provided(self.payload_size as u64)
            .with_expected(options::MAX_VALUE_SIZE as u64));
        }

        if self.version < options::MIN_SCHEMA_VERSION {
            return Err(Error::validation(
                ErrorCode::SystemUnsupportedVersion,
                format!(
                    "unsupported schema version {} (supported range {}..={})",
                    self.version,
                    options::MIN_SCHEMA_VERSION,
                    options::MAX_SCHEMA_VERSION,
                ),
            ));
        }

        Ok(())
    }
}

/// A complete key-value entry as stored in a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Wire form of the record payload.
#[derive(Clone, PartialEq, Message)]
struct RecordPayload {
    #[prost(bytes = "vec", tag = "1")]
    key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    value: Vec<u8>,
}

/// Encodes and decodes record payloads.
///
/// Implementations must be deterministic: encoding equal input must yield
/// identical bytes, because checksum verification re-encodes the decoded
/// record and compares against the stored CRC.
pub trait PayloadCodec {
    fn encode(&self, key: &[u8], value: &[u8]) -> Result<Vec<u8>>;
    fn decode(&self, buf: &[u8]) -> Result<(Vec<u8>, Vec<u8>)>;
}

/// Protobuf payload codec; prost emits fields in tag order, so output is
/// deterministic for equal input.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtobufCodec;

impl PayloadCodec for ProtobufCodec {
    fn encode(&self, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let payload = RecordPayload {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        Ok(payload.encode_to_vec())
    }

    fn decode(&self, buf: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let payload = RecordPayload::decode(buf).map_err(|e| {
            Error::storage(
                ErrorCode::RecordDeserialization,
                "failed to decode record payload",
            )
            .with_source(e)
        })?;

        if payload.key.is_empty() {
            return Err(Error::storage(
                ErrorCode::RecordDeserialization,
                "decoded record payload has an empty key",
            ));
        }
        if payload.value.is_empty() {
            return Err(Error::storage(
                ErrorCode::RecordDeserialization,
                "decoded record payload has an empty value",
            ));
        }

        Ok((payload.key, payload.value))
    }
}
