//! Size-based rotation strategy for rotating file handlers.
//!
//! When the active file is already larger than `max_bytes`, numbered siblings
//! are shifted up by one (`app.log.1` → `app.log.2`, …), the oldest
//! (`app.log.<backup_count>`) is deleted and the active file becomes
//! `app.log.1`. The batch that triggered the check is then written to a fresh
//! file, so at most `backup_count + 1` files exist at any time.
//!
//! Missing files are skipped silently: several processes may race through
//! the same rotation and only one of them finds each file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::handlers::file::RotationStrategy;

pub(crate) struct FileRotationStrategy {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
}

impl FileRotationStrategy {
    pub(crate) fn new(path: PathBuf, max_bytes: u64, backup_count: usize) -> Self {
        Self {
            path,
            max_bytes,
            backup_count,
        }
    }

    pub(crate) fn should_rotate(&self, current_len: u64) -> bool {
        self.max_bytes != 0 && current_len > self.max_bytes
    }

    pub(crate) fn rotate(&self) -> io::Result<()> {
        if self.backup_count == 0 {
            return Self::remove_file_if_exists(&self.path);
        }
        self.rotate_backups()?;
        Self::rename_file_if_exists(&self.path, &self.backup_path(1))
    }

    pub(crate) fn remove_file_if_exists(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn rename_file_if_exists(src: &Path, dst: &Path) -> io::Result<()> {
        match fs::rename(src, dst) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Delete backups numbered above `backup_count`, left behind when the
    /// limit was lowered between runs.
    pub(crate) fn remove_excess_backups(&self) -> io::Result<()> {
        let mut extra = self.backup_count + 1;
        loop {
            let candidate = self.backup_path(extra);
            match fs::remove_file(&candidate) {
                Ok(()) => {
                    extra += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    break;
                }
                Err(err) => {
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn cascade_backups(&self) -> io::Result<()> {
        for idx in (1..self.backup_count).rev() {
            let src = self.backup_path(idx);
            if src.is_file() {
                let dst = self.backup_path(idx + 1);
                Self::rename_file_if_exists(&src, &dst)?;
            }
        }
        Ok(())
    }

    pub(crate) fn rotate_backups(&self) -> io::Result<()> {
        self.remove_excess_backups()?;
        let oldest = self.backup_path(self.backup_count);
        Self::remove_file_if_exists(&oldest)?;
        self.cascade_backups()
    }

    pub(crate) fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }
}

impl RotationStrategy for FileRotationStrategy {
    fn before_write(&self, _path: &Path, current_len: u64) -> io::Result<bool> {
        if self.should_rotate(current_len) {
            self.rotate()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
