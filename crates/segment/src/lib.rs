//! # Segment — filename codec and discovery
//!
//! Segment files are named `{prefix}_{id:05}_{timestamp}.seg`, where `id` is
//! a 16-bit sequence number (zero-padded to width 5) and `timestamp` is the
//! segment's creation time in nanoseconds since the unix epoch.
//!
//! The zero padding makes lexicographic filename order equal numeric id
//! order, so "the most recent segment" is simply the last name in a sorted
//! directory listing.
//!
//! ## Example
//!
//! ```
//! use std::path::Path;
//!
//! let name = segment::generate(7, "segment", 1678881234567890);
//! assert_eq!(name, "segment_00007_1678881234567890.seg");
//! assert_eq!(segment::parse_id(Path::new(&name), "segment").unwrap(), 7);
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Extension carried by every segment file.
pub const SEGMENT_EXTENSION: &str = "seg";

/// Errors raised while decoding a segment filename.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The filename does not start with the configured prefix.
    #[error("filename {filename:?} does not start with expected prefix {prefix:?}")]
    PrefixMismatch { filename: String, prefix: String },

    /// Too few underscore-separated parts after stripping the prefix.
    #[error("filename {filename:?} has unexpected format, expected prefix_id_timestamp.seg")]
    FormatMismatch { filename: String },

    /// The id or timestamp field is not a valid integer.
    #[error("failed to parse segment {field} {value:?} as an integer")]
    NumericParse { field: &'static str, value: String },
}

/// Builds the filename for segment `id` created at `timestamp_ns`.
pub fn generate(id: u16, prefix: &str, timestamp_ns: i64) -> String {
    format!("{prefix}_{id:05}_{timestamp_ns}.{SEGMENT_EXTENSION}")
}

/// Extracts the sequence id from a segment path.
pub fn parse_id(path: &Path, prefix: &str) -> Result<u16, NameError> {
    let (id_part, _) = name_parts(path, prefix)?;
    id_part
        .parse::<u16>()
        .map_err(|_| NameError::NumericParse {
            field: "id",
            value: id_part.to_string(),
        })
}

/// Extracts the creation timestamp (nanoseconds) from a segment path.
pub fn parse_timestamp(path: &Path, prefix: &str) -> Result<i64, NameError> {
    let (_, ts_part) = name_parts(path, prefix)?;
    ts_part
        .parse::<i64>()
        .map_err(|_| NameError::NumericParse {
            field: "timestamp",
            value: ts_part.to_string(),
        })
}

/// Splits a segment filename into its id and timestamp fields.
///
/// After stripping the prefix and extension, the remainder splits on `_`
/// into at least three parts: the empty element before the leading
/// underscore, the id, and the timestamp.
fn name_parts<'a>(path: &'a Path, prefix: &str) -> Result<(&'a str, &'a str), NameError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| NameError::FormatMismatch {
            filename: path.display().to_string(),
        })?;

    let rest = filename
        .strip_prefix(prefix)
        .ok_or_else(|| NameError::PrefixMismatch {
            filename: filename.to_string(),
            prefix: prefix.to_string(),
        })?;

    let stem = rest.split('.').next().unwrap_or(rest);
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return Err(NameError::FormatMismatch {
            filename: filename.to_string(),
        });
    }

    Ok((parts[1], parts[2]))
}

/// Returns every segment file under `dir` with the given prefix, sorted
/// ascending by filename (and therefore by id).
pub fn list_segments(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    if prefix.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "segment prefix must be non-empty",
        ));
    }

    let suffix = format!(".{SEGMENT_EXTENSION}");
    let mut names: Vec<String> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(prefix) && name.ends_with(&suffix) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();

    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// Returns the path of the most recent segment file, if any exist.
pub fn last_segment(dir: &Path, prefix: &str) -> io::Result<Option<PathBuf>> {
    let mut segments = list_segments(dir, prefix)?;
    Ok(segments.pop())
}
