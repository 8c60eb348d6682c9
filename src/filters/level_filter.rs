//! Level-bitmask filter.

use crate::{
    filters::CourierFilter,
    level::LevelMask,
    log_entry::CourierLogEntry,
};

#[derive(Debug, Clone, Copy)]
pub struct LevelFilter {
    levels: LevelMask,
}

impl LevelFilter {
    pub fn new(levels: LevelMask) -> Self {
        Self { levels }
    }
}

impl CourierFilter for LevelFilter {
    fn should_log(&self, entry: &CourierLogEntry) -> bool {
        self.levels.admits(entry.level)
    }
}
