//! Configuration structures for [`CourierFileHandler`](super::CourierFileHandler).
//!
//! Permission modes are only applied on Unix; other platforms keep the
//! defaults chosen by the operating system.

/// Default permission for directories created on the way to the log file.
pub const DEFAULT_DIR_MODE: u32 = 0o775;

/// Configuration options for constructing a file handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHandlerConfig {
    /// Permission applied to the log file after every write, if set.
    pub file_mode: Option<u32>,
    /// Permission applied to every directory the handler creates.
    pub dir_mode: u32,
}

impl Default for FileHandlerConfig {
    fn default() -> Self {
        Self {
            file_mode: None,
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

impl FileHandlerConfig {
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = Some(mode);
        self
    }

    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }
}
