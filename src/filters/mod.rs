//! Filtering components for log entries.
//!
//! Provides the [`CourierFilter`] trait with its level and category filters,
//! plus [`filter_entries`], the pure function the logger applies to every
//! batch before export.

use crate::level::LevelMask;
use crate::log_entry::CourierLogEntry;

/// Trait implemented by all log filters.
///
/// Filters are `Send + Sync` so they can be shared across threads.
pub trait CourierFilter: Send + Sync {
    /// Return `true` if `entry` should be exported.
    fn should_log(&self, entry: &CourierLogEntry) -> bool;
}

pub mod category_filter;
pub mod level_filter;

pub use category_filter::CategoryFilter;
pub use level_filter::LevelFilter;

/// Filter `entries` by level bitmask and category lists.
///
/// A mask of `0` admits every level. An empty `categories` list admits every
/// category; `except` removes entries even when `categories` admitted them.
/// Patterns ending in `*` match by prefix. Input order is preserved.
pub fn filter_entries(
    entries: Vec<CourierLogEntry>,
    levels: LevelMask,
    categories: &[String],
    except: &[String],
) -> Vec<CourierLogEntry> {
    let level_filter = LevelFilter::new(levels);
    let category_filter = CategoryFilter::new(categories.to_vec(), except.to_vec());
    entries
        .into_iter()
        .filter(|entry| level_filter.should_log(entry) && category_filter.should_log(entry))
        .collect()
}
