use std::any::Any;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::log_entry::CourierLogEntry;

/// Errors raised while exporting a batch of log entries.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Unable to append to log file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create directory \"{path}\": {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to rotate log files next to {path}: {source}")]
    Rotate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write log file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Trait implemented by all log export targets.
///
/// Handlers receive already filtered batches in FIFO order and must write the
/// whole batch or report an error. They are `Send + Sync` so one handler can be
/// shared by every component holding the logger.
pub trait CourierHandlerTrait: Send + Sync {
    /// Export a non-empty batch of entries.
    fn export(&self, entries: &[CourierLogEntry]) -> Result<(), HandlerError>;

    /// Return `self` as `Any` for downcasting in tests and diagnostics.
    fn as_any(&self) -> &dyn Any;
}
