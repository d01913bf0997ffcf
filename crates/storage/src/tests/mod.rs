mod pool_tests;
mod scanner_tests;

use std::path::Path;
use std::sync::Arc;

use common::Options;

/// Options pointing at a per-test temp directory, with a small segment size
/// so rotation is reachable without gigabytes of writes.
pub fn test_options(dir: &Path) -> Arc<Options> {
    let mut opts = Options::default();
    opts.data_dir = dir.to_path_buf();
    opts.segment.directory = dir.join("segments");
    opts.segment.size = 1024 * 1024;
    Arc::new(opts)
}
