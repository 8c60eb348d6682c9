//! Core rotating file handler logic.
//!
//! This module owns rotation configuration and delegates all I/O to
//! [`CourierFileHandler`].

use std::{any::Any, path::Path};

use delegate::delegate;

use super::strategy::FileRotationStrategy;
use crate::{
    formatter::CourierFormatter,
    handler::{CourierHandlerTrait, HandlerError},
    handlers::file::{CourierFileHandler, FileHandlerConfig},
    log_entry::CourierLogEntry,
};

/// Bytes in one megabyte, the unit `max_file_size` is configured in.
pub const BYTES_PER_MB: u64 = 1_048_576;

/// Rotation thresholds controlling when a file rolls over.
///
/// Grouping the limits together keeps the handler constructor concise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationConfig {
    /// File size in bytes above which the next export rotates first.
    ///
    /// Set to `0` to disable rotation.
    pub max_bytes: u64,
    /// Number of rotated backup files to retain.
    pub backup_count: usize,
}

impl RotationConfig {
    /// Create a rotation configuration with explicit limits.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier::RotationConfig;
    ///
    /// let config = RotationConfig::new(1024, 3);
    /// assert_eq!(config.max_bytes, 1024);
    /// assert_eq!(config.backup_count, 3);
    /// ```
    pub const fn new(max_bytes: u64, backup_count: usize) -> Self {
        Self {
            max_bytes,
            backup_count,
        }
    }

    /// Limits expressed the way the configuration file does: megabytes and
    /// a file count, each clamped to at least one.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier::RotationConfig;
    ///
    /// let config = RotationConfig::from_megabytes(0, 0);
    /// assert_eq!(config.max_bytes, 1_048_576);
    /// assert_eq!(config.backup_count, 1);
    /// ```
    pub const fn from_megabytes(max_file_size_mb: u64, max_log_files: usize) -> Self {
        let mb = if max_file_size_mb < 1 { 1 } else { max_file_size_mb };
        let files = if max_log_files < 1 { 1 } else { max_log_files };
        Self::new(mb * BYTES_PER_MB, files)
    }

    /// Return a configuration that disables rotation.
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self::from_megabytes(10, 5)
    }
}

/// File handler variant configured for size-based rotation.
///
/// This wrapper wires [`FileRotationStrategy`] into [`CourierFileHandler`] so
/// the size check and rollover run while the export lock is held. The wrapper
/// owns rotation thresholds and delegates writing to the inner handler.
pub struct CourierRotatingFileHandler {
    inner: CourierFileHandler<FileRotationStrategy>,
    max_bytes: u64,
    backup_count: usize,
}

impl CourierRotatingFileHandler {
    /// Build a rotating handler with the supplied configuration.
    pub fn with_config<P, F>(
        path: P,
        formatter: F,
        config: FileHandlerConfig,
        rotation_config: RotationConfig,
    ) -> Result<Self, HandlerError>
    where
        P: AsRef<Path>,
        F: CourierFormatter + 'static,
    {
        let RotationConfig {
            max_bytes,
            backup_count,
        } = rotation_config;
        let strategy = FileRotationStrategy::new(path.as_ref().to_path_buf(), max_bytes, backup_count);
        let inner = CourierFileHandler::with_config(path, formatter, config, strategy)?;
        Ok(Self {
            inner,
            max_bytes,
            backup_count,
        })
    }

    /// Return the configured rotation thresholds.
    pub fn rotation_limits(&self) -> (u64, usize) {
        (self.max_bytes, self.backup_count)
    }

    /// Path of the `index`-th rotated sibling (`<path>.<index>`).
    pub fn backup_path(&self, index: usize) -> std::path::PathBuf {
        self.inner.rotation().backup_path(index)
    }

    delegate! {
        to self.inner {
            /// Path of the active log file.
            pub fn path(&self) -> &Path;
        }
    }
}

impl CourierHandlerTrait for CourierRotatingFileHandler {
    delegate! {
        to self.inner {
            fn export(&self, entries: &[CourierLogEntry]) -> Result<(), HandlerError>;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
