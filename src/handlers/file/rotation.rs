//! Hook invoked by the file handler before each batch is written.

use std::io;
use std::path::Path;

/// Decides whether, and how, the active log file is rolled over.
///
/// The handler calls [`before_write`](RotationStrategy::before_write) while
/// holding the exclusive lock on the active file. Returning `Ok(true)` tells
/// the handler the file at `path` was moved away and the batch must be written
/// to a freshly opened file.
pub trait RotationStrategy: Send + Sync {
    fn before_write(&self, path: &Path, current_len: u64) -> io::Result<bool>;
}

/// Strategy used by handlers that never rotate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRotation;

impl RotationStrategy for NoRotation {
    fn before_write(&self, _path: &Path, _current_len: u64) -> io::Result<bool> {
        Ok(false)
    }
}
