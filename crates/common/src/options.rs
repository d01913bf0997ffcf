//! Engine configuration.
//!
//! [`Options`] carries the tunables for an EmberKV instance. Fields are
//! public so embedders (and tests) can construct configurations directly;
//! the `with_*` setters apply the documented bounds and silently keep the
//! prior value when an input falls outside them.

use std::path::PathBuf;
use std::time::Duration;

/// Default base directory for data files.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/emberkv";

/// Default filename prefix for segment files.
pub const DEFAULT_SEGMENT_PREFIX: &str = "segment";

/// Default target size for a segment file before rotation (1 GiB).
pub const DEFAULT_SEGMENT_SIZE: u64 = 1024 * 1024 * 1024;

/// Minimum accepted segment size (512 MiB, exclusive).
pub const MIN_SEGMENT_SIZE: u64 = 512 * 1024 * 1024;

/// Maximum accepted segment size (4 GiB, exclusive).
pub const MAX_SEGMENT_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Default interval between compaction runs.
pub const DEFAULT_COMPACT_INTERVAL: Duration = Duration::from_secs(5 * 60 * 60);

/// Minimum accepted compaction interval (exclusive; equals the default).
pub const MIN_COMPACT_INTERVAL: Duration = DEFAULT_COMPACT_INTERVAL;

/// Maximum accepted compaction interval (one week, inclusive).
pub const MAX_COMPACT_INTERVAL: Duration = Duration::from_secs(168 * 60 * 60);

/// Maximum allowed size for a record key in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 65535;

/// Maximum allowed size for a record value in bytes (100 MiB).
pub const MAX_VALUE_SIZE: u32 = 100 * 1024 * 1024;

/// Minimum supported record schema version.
pub const MIN_SCHEMA_VERSION: u8 = 1;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Maximum supported record schema version.
pub const MAX_SCHEMA_VERSION: u8 = 255;

/// Configuration for segment files.
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// Maximum size a segment may grow to before rotation.
    pub size: u64,
    /// Directory where segment files are stored.
    pub directory: PathBuf,
    /// Filename prefix; the final name is `{prefix}_{id:05}_{timestamp}.seg`.
    pub prefix: String,
    /// Rotate to a fresh segment when a write would push the active segment
    /// past [`SegmentOptions::size`]. Disabling reproduces the historical
    /// behavior where rotation only happens at open.
    pub rotate_on_write: bool,
}

/// Configuration for an EmberKV instance.
#[derive(Debug, Clone)]
pub struct Options {
    /// Base path where data files are stored.
    pub data_dir: PathBuf,
    /// How often compaction merges old segments. Validated configuration
    /// only: compaction itself is not part of the core engine.
    pub compact_interval: Duration,
    /// Segment sizing and naming.
    pub segment: SegmentOptions,
}

impl Default for Options {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Self {
            segment: SegmentOptions {
                size: DEFAULT_SEGMENT_SIZE,
                directory: data_dir.join("segments"),
                prefix: DEFAULT_SEGMENT_PREFIX.to_string(),
                rotate_on_write: true,
            },
            compact_interval: DEFAULT_COMPACT_INTERVAL,
            data_dir,
        }
    }
}

impl Options {
    /// Sets the base data directory and derives the segment directory as
    /// `{data_dir}/segments`. Call [`Options::with_segment_dir`] afterwards
    /// to place segments elsewhere. Empty input keeps the prior value.
    pub fn with_data_dir(mut self, directory: impl AsRef<str>) -> Self {
        let directory = directory.as_ref().trim();
        if !directory.is_empty() {
            self.data_dir = PathBuf::from(directory);
            self.segment.directory = self.data_dir.join("segments");
        }
        self
    }

    /// Sets the segment directory. Empty input keeps the prior value.
    pub fn with_segment_dir(mut self, directory: impl AsRef<str>) -> Self {
        let directory = directory.as_ref().trim();
        if !directory.is_empty() {
            self.segment.directory = PathBuf::from(directory);
        }
        self
    }

    /// Sets the segment filename prefix. Empty input keeps the prior value.
    pub fn with_segment_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        let prefix = prefix.as_ref().trim();
        if !prefix.is_empty() {
            self.segment.prefix = prefix.to_string();
        }
        self
    }

    /// Sets the maximum segment size. Accepted only strictly between
    /// [`MIN_SEGMENT_SIZE`] and [`MAX_SEGMENT_SIZE`]; anything else keeps
    /// the prior value.
    pub fn with_segment_size(mut self, size: u64) -> Self {
        if size > MIN_SEGMENT_SIZE && size < MAX_SEGMENT_SIZE {
            self.segment.size = size;
        }
        self
    }

    /// Sets the compaction interval. Accepted only strictly above
    /// [`MIN_COMPACT_INTERVAL`] and at most [`MAX_COMPACT_INTERVAL`].
    pub fn with_compact_interval(mut self, interval: Duration) -> Self {
        if interval > MIN_COMPACT_INTERVAL && interval <= MAX_COMPACT_INTERVAL {
            self.compact_interval = interval;
        }
        self
    }

    /// Enables or disables rotation when a write would overflow the active
    /// segment.
    pub fn with_rotate_on_write(mut self, enabled: bool) -> Self {
        self.segment.rotate_on_write = enabled;
        self
    }
}

/// Renders a byte count in a human-readable unit for log and error messages.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: f64 = 1024.0;
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut exp = 0;
    while value >= UNIT && exp < UNITS.len() - 1 {
        value /= UNIT;
        exp += 1;
    }

    if (value - value.round()).abs() < 0.01 {
        format!("{:.0} {}", value.round(), UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}
