use std::path::{Path, PathBuf};

use common::Options;

use crate::Db;

/// Options rooted in a per-test temp directory. The segment size is set
/// directly (bypassing the bounded setter) so rotation is reachable in
/// tests without writing hundreds of megabytes.
pub fn test_options(dir: &Path) -> Options {
    let mut opts = Options::default();
    opts.data_dir = dir.to_path_buf();
    opts.segment.directory = dir.join("segments");
    opts.segment.size = 1024 * 1024;
    opts
}

pub fn test_options_with_segment_size(dir: &Path, size: u64) -> Options {
    let mut opts = test_options(dir);
    opts.segment.size = size;
    opts
}

pub fn open_db(dir: &Path) -> Db {
    Db::open("engine-tests", test_options(dir)).unwrap()
}

/// Segment files currently on disk, ascending by id.
pub fn segment_files(dir: &Path) -> Vec<PathBuf> {
    segment::list_segments(&dir.join("segments"), "segment").unwrap()
}
