//! Public API for the file-based export target.
//!
//! `CourierFileHandler` appends formatted batches to a single log file. Every
//! export opens the file in append mode, takes an exclusive advisory lock for
//! the duration of one write (or rotate-then-write), and releases it on every
//! exit path through [`FileLock`]. Keeping no descriptor open between exports
//! lets several consumer processes share one log file. A lock taken on a file
//! that another process has since rotated away is dropped and the active
//! file reopened.
//!
//! Rotation is pluggable through [`RotationStrategy`]; the rotating handler in
//! [`crate::handlers::rotating`] supplies the size-based implementation.
mod config;
mod rotation;

use std::{
    any::Any,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{
    formatter::{CourierFormatter, DefaultFormatter},
    handler::{CourierHandlerTrait, HandlerError},
    log_entry::CourierLogEntry,
};

pub use config::{DEFAULT_DIR_MODE, FileHandlerConfig};
pub use rotation::{NoRotation, RotationStrategy};

/// Exclusive advisory lock on an open log file, released when dropped.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(file: File, path: &Path) -> Result<Self, HandlerError> {
        file.lock().map_err(|source| HandlerError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            log::warn!("CourierFileHandler: failed to release log file lock: {err}");
        }
    }
}

/// Whether `path` still names the file behind `file`.
///
/// False once another writer has rotated or removed the file.
#[cfg(unix)]
fn names_file(path: &Path, file: &File) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(named) => Ok(held.dev() == named.dev() && held.ino() == named.ino()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(not(unix))]
fn names_file(_path: &Path, _file: &File) -> io::Result<bool> {
    Ok(true)
}

/// File-based export target.
pub struct CourierFileHandler<R = NoRotation> {
    path: PathBuf,
    formatter: Box<dyn CourierFormatter>,
    config: FileHandlerConfig,
    rotation: R,
}

impl CourierFileHandler {
    /// Create a handler writing to `path` with default settings.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, HandlerError> {
        Self::with_config(path, DefaultFormatter, FileHandlerConfig::default(), NoRotation)
    }
}

impl<R: RotationStrategy> CourierFileHandler<R> {
    /// Create a handler with explicit formatter, permissions and rotation.
    ///
    /// The parent directory of `path` is created recursively, each new
    /// directory receiving `config.dir_mode`.
    pub fn with_config<P, F>(
        path: P,
        formatter: F,
        config: FileHandlerConfig,
        rotation: R,
    ) -> Result<Self, HandlerError>
    where
        P: AsRef<Path>,
        F: CourierFormatter + 'static,
    {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_directory(parent, config.dir_mode)?;
        }
        Ok(Self {
            path,
            formatter: Box::new(formatter),
            config,
            rotation,
        })
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn rotation(&self) -> &R {
        &self.rotation
    }

    fn open_append(&self) -> Result<File, HandlerError> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        if let Some(mode) = self.config.file_mode {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        options.open(&self.path).map_err(|source| HandlerError::Open {
            path: self.path.clone(),
            source,
        })
    }

    fn write_err(&self, source: io::Error) -> HandlerError {
        HandlerError::Write {
            path: self.path.clone(),
            source,
        }
    }

    /// Open the active file and lock it, reopening until the locked file is
    /// the one `path` names.
    fn lock_current(&self) -> Result<FileLock, HandlerError> {
        loop {
            let lock = FileLock::acquire(self.open_append()?, &self.path)?;
            if names_file(&self.path, &lock.file).map_err(|e| self.write_err(e))? {
                return Ok(lock);
            }
        }
    }

    /// Append `text`, rotating first when the strategy asks for it.
    ///
    /// Returns whether a rotation happened.
    fn append_locked(&self, text: &str) -> Result<bool, HandlerError> {
        let rotated = {
            let mut lock = self.lock_current()?;
            let current_len = lock.file.metadata().map_err(|e| self.write_err(e))?.len();
            let rotated = self
                .rotation
                .before_write(&self.path, current_len)
                .map_err(|source| HandlerError::Rotate {
                    path: self.path.clone(),
                    source,
                })?;
            if !rotated {
                lock.file
                    .write_all(text.as_bytes())
                    .map_err(|e| self.write_err(e))?;
            }
            rotated
        };

        if rotated {
            let mut lock = self.lock_current()?;
            lock.file
                .write_all(text.as_bytes())
                .map_err(|e| self.write_err(e))?;
        }
        Ok(rotated)
    }

    fn apply_file_mode(&self) -> Result<(), HandlerError> {
        #[cfg(unix)]
        if let Some(mode) = self.config.file_mode {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))
                .map_err(|e| self.write_err(e))?;
        }
        Ok(())
    }
}

impl<R: RotationStrategy + 'static> CourierHandlerTrait for CourierFileHandler<R> {
    fn export(&self, entries: &[CourierLogEntry]) -> Result<(), HandlerError> {
        if entries.is_empty() {
            return Ok(());
        }
        let text = self.formatter.format_batch(entries);
        self.append_locked(&text)?;
        self.apply_file_mode()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Create `path` and any missing parents, applying `mode` to each directory
/// created so the process umask does not weaken it.
///
/// A directory appearing concurrently (another process racing us) is not an
/// error.
pub fn create_directory(path: &Path, mode: u32) -> Result<(), HandlerError> {
    if path.is_dir() {
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && parent != path
    {
        create_directory(parent, mode)?;
    }
    if let Err(source) = fs::create_dir(path)
        && !path.is_dir()
    {
        return Err(HandlerError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        });
    }
    set_dir_mode(path, mode)
}

#[cfg(unix)]
fn set_dir_mode(path: &Path, mode: u32) -> Result<(), HandlerError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|source| {
        HandlerError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path, _mode: u32) -> Result<(), HandlerError> {
    Ok(())
}

#[cfg(test)]
mod tests;
