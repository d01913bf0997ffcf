//! Structured errors for the storage engine.
//!
//! Every fallible operation in the engine returns [`Error`]: a coarse
//! [`Category`], a machine-readable [`ErrorCode`], a human message, optional
//! contextual fields (segment id, path, file name, byte offset, key,
//! provided/expected sizes), and a wrapped cause chain reachable through
//! [`std::error::Error::source`].
//!
//! Layer boundaries enrich errors rather than replacing them: storage adds
//! the path and segment id it was touching, the engine adds the key, and the
//! original cause stays at the bottom of the chain.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse grouping used when callers only care which subsystem failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Storage,
    Validation,
    Index,
}

/// Machine-readable error codes.
///
/// Rendered as stable `SCREAMING_SNAKE` strings so they can be logged,
/// matched, and reported without depending on message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // System-level failures.
    SystemInternal,
    SystemInvalidInput,
    SystemPermissionDenied,
    SystemDiskFull,
    SystemFilesystemReadonly,
    SystemUnsupportedVersion,

    // Raw I/O failures.
    IoGeneral,
    IoWriteFailed,
    IoSyncFailed,
    IoSeekFailed,
    IoCloseFailed,

    // Record framing and payload failures.
    RecordHeaderReadFailed,
    RecordHeaderWriteFailed,
    RecordSerialization,
    RecordDeserialization,
    RecordPreparationFailed,
    RecordKeyMismatch,
    RecordChecksumMismatch,
    RecordPayloadReadFailed,
    RecordPayloadWriteFailed,
    RecordPayloadTooLarge,

    // Segment file failures.
    SegmentUnexpectedEof,
    SegmentOpenFailed,
    SegmentCloseFailed,

    // Index lookups.
    IndexKeyNotFound,

    // Input validation.
    ValidationInvalidData,

    // Engine lifecycle.
    EngineClosed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SystemInternal => "SYSTEM_INTERNAL",
            ErrorCode::SystemInvalidInput => "SYSTEM_INVALID_INPUT",
            ErrorCode::SystemPermissionDenied => "SYSTEM_PERMISSION_DENIED",
            ErrorCode::SystemDiskFull => "SYSTEM_DISK_FULL",
            ErrorCode::SystemFilesystemReadonly => "SYSTEM_FILESYSTEM_READONLY",
            ErrorCode::SystemUnsupportedVersion => "SYSTEM_UNSUPPORTED_VERSION",
            ErrorCode::IoGeneral => "IO_GENERAL",
            ErrorCode::IoWriteFailed => "IO_WRITE_FAILED",
            ErrorCode::IoSyncFailed => "IO_SYNC_FAILED",
            ErrorCode::IoSeekFailed => "IO_SEEK_FAILED",
            ErrorCode::IoCloseFailed => "IO_CLOSE_FAILED",
            ErrorCode::RecordHeaderReadFailed => "RECORD_HEADER_READ_FAILED",
            ErrorCode::RecordHeaderWriteFailed => "RECORD_HEADER_WRITE_FAILED",
            ErrorCode::RecordSerialization => "RECORD_SERIALIZATION",
            ErrorCode::RecordDeserialization => "RECORD_DESERIALIZATION",
            ErrorCode::RecordPreparationFailed => "RECORD_PREPARATION_FAILED",
            ErrorCode::RecordKeyMismatch => "RECORD_KEY_MISMATCH",
            ErrorCode::RecordChecksumMismatch => "RECORD_CHECKSUM_MISMATCH",
            ErrorCode::RecordPayloadReadFailed => "RECORD_PAYLOAD_READ_FAILED",
            ErrorCode::RecordPayloadWriteFailed => "RECORD_PAYLOAD_WRITE_FAILED",
            ErrorCode::RecordPayloadTooLarge => "RECORD_PAYLOAD_TOO_LARGE",
            ErrorCode::SegmentUnexpectedEof => "SEGMENT_UNEXPECTED_EOF",
            ErrorCode::SegmentOpenFailed => "SEGMENT_OPEN_FAILED",
            ErrorCode::SegmentCloseFailed => "SEGMENT_CLOSE_FAILED",
            ErrorCode::IndexKeyNotFound => "INDEX_KEY_NOT_FOUND",
            ErrorCode::ValidationInvalidData => "VALIDATION_INVALID_DATA",
            ErrorCode::EngineClosed => "ENGINE_CLOSED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured engine error.
///
/// Construct with [`Error::storage`], [`Error::validation`], or
/// [`Error::index`], then chain `with_*` builders to attach context.
#[derive(Debug)]
pub struct Error {
    category: Category,
    code: ErrorCode,
    message: String,
    segment_id: Option<u16>,
    offset: Option<u64>,
    file_name: Option<String>,
    path: Option<PathBuf>,
    key: Option<String>,
    operation: Option<&'static str>,
    provided: Option<u64>,
    expected: Option<u64>,
    source: Option<Source>,
}

impl Error {
    fn new(category: Category, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            segment_id: None,
            offset: None,
            file_name: None,
            path: None,
            key: None,
            operation: None,
            provided: None,
            expected: None,
            source: None,
        }
    }

    /// A storage-layer error (file, segment, or record I/O).
    pub fn storage(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Category::Storage, code, message)
    }

    /// A validation error (data outside acceptable ranges).
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Category::Validation, code, message)
    }

    /// An index-layer error (lookups against the in-memory map).
    pub fn index(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Category::Index, code, message)
    }

    pub fn with_source(mut self, source: impl Into<Source>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_segment_id(mut self, id: u16) -> Self {
        self.segment_id = Some(id);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_key(mut self, key: &[u8]) -> Self {
        self.key = Some(String::from_utf8_lossy(key).into_owned());
        self
    }

    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_provided(mut self, provided: u64) -> Self {
        self.provided = Some(provided);
        self
    }

    pub fn with_expected(mut self, expected: u64) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn segment_id(&self) -> Option<u16> {
        self.segment_id
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True for the non-fatal "key is not in the index" miss.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::IndexKeyNotFound
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.code)?;
        if let Some(id) = self.segment_id {
            write!(f, " segment={id}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " offset={offset}")?;
        }
        if let Some(name) = &self.file_name {
            write!(f, " file={name}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " path={}", path.display())?;
        }
        if let Some(key) = &self.key {
            write!(f, " key={key}")?;
        }
        if let Some(operation) = self.operation {
            write!(f, " operation={operation}")?;
        }
        if let (Some(provided), Some(expected)) = (self.provided, self.expected) {
            write!(f, " provided={provided} expected={expected}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| &**s as &(dyn std::error::Error + 'static))
    }
}

/// Classifies a failure to create the segment directory.
pub fn classify_dir_error(err: io::Error, path: &Path) -> Error {
    let error = match err.kind() {
        io::ErrorKind::PermissionDenied => Error::storage(
            ErrorCode::SystemPermissionDenied,
            "insufficient permissions to create segment directory",
        ),
        io::ErrorKind::StorageFull => Error::storage(
            ErrorCode::SystemDiskFull,
            "insufficient disk space to create segment directory",
        ),
        io::ErrorKind::ReadOnlyFilesystem => Error::storage(
            ErrorCode::SystemFilesystemReadonly,
            "cannot create directory on read-only filesystem",
        ),
        _ => Error::storage(ErrorCode::IoGeneral, "failed to create segment directory"),
    };
    error.with_source(err).with_path(path)
}

/// Classifies a failure to open a segment file.
pub fn classify_open_error(err: io::Error, path: &Path, file_name: &str) -> Error {
    let error = match err.kind() {
        io::ErrorKind::PermissionDenied => Error::storage(
            ErrorCode::SystemPermissionDenied,
            "insufficient permissions to open segment file",
        ),
        io::ErrorKind::StorageFull => Error::storage(
            ErrorCode::SystemDiskFull,
            "insufficient disk space to create segment file",
        ),
        io::ErrorKind::ReadOnlyFilesystem => Error::storage(
            ErrorCode::SystemFilesystemReadonly,
            "cannot create file on read-only filesystem",
        ),
        _ => Error::storage(ErrorCode::SegmentOpenFailed, "failed to open segment file"),
    };
    error.with_source(err).with_path(path).with_file_name(file_name)
}

/// Classifies a failure to fsync a segment file.
pub fn classify_sync_error(err: io::Error, file_name: &str, path: &Path) -> Error {
    let error = match err.kind() {
        io::ErrorKind::StorageFull => Error::storage(
            ErrorCode::SystemDiskFull,
            "cannot sync file: insufficient disk space",
        ),
        io::ErrorKind::ReadOnlyFilesystem => Error::storage(
            ErrorCode::SystemFilesystemReadonly,
            "cannot sync file: filesystem is read-only",
        ),
        _ => Error::storage(ErrorCode::IoSyncFailed, "failed to sync segment file to disk"),
    };
    error
        .with_source(err)
        .with_path(path)
        .with_file_name(file_name)
        .with_operation("file_sync")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_context() {
        let err = Error::storage(ErrorCode::RecordChecksumMismatch, "bad record")
            .with_segment_id(3)
            .with_offset(42)
            .with_file_name("segment_00003_1.seg");
        let rendered = err.to_string();
        assert!(rendered.contains("RECORD_CHECKSUM_MISMATCH"));
        assert!(rendered.contains("segment=3"));
        assert!(rendered.contains("offset=42"));
        assert!(rendered.contains("segment_00003_1.seg"));
    }

    #[test]
    fn source_chain_is_reachable() {
        use std::error::Error as _;

        let cause = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err = Error::storage(ErrorCode::SegmentUnexpectedEof, "short read").with_source(cause);
        assert!(err.source().is_some());
    }

    #[test]
    fn open_error_classification() {
        let path = Path::new("/data/segments/segment_00001_1.seg");
        let err = classify_open_error(
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            path,
            "segment_00001_1.seg",
        );
        assert_eq!(err.code(), ErrorCode::SystemPermissionDenied);
        assert_eq!(err.path(), Some(path));

        let err = classify_open_error(
            io::Error::new(io::ErrorKind::NotFound, "missing"),
            path,
            "segment_00001_1.seg",
        );
        assert_eq!(err.code(), ErrorCode::SegmentOpenFailed);
    }

    #[test]
    fn not_found_helper() {
        assert!(Error::index(ErrorCode::IndexKeyNotFound, "miss").is_not_found());
        assert!(!Error::storage(ErrorCode::IoGeneral, "io").is_not_found());
    }
}
