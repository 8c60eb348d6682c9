//! Compatibility bridge for the Rust `log` crate.
//!
//! [`CourierLogAdapter`] implements `log::Log` by turning each record into a
//! [`CourierLogEntry`] on a shared [`CourierLogger`], so diagnostics from this
//! crate and its dependencies land in the same audit file as pipeline
//! events. [`install_global_logger`] installs it once per process.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use log::{Metadata, Record};

use crate::level::CourierLevel;
use crate::log_entry::CourierLogEntry;
use crate::logger::CourierLogger;
use crate::trace::StackFrame;

/// Adapter implementing the Rust `log::Log` trait.
pub struct CourierLogAdapter {
    logger: Arc<CourierLogger>,
    max_level: log::LevelFilter,
}

impl CourierLogAdapter {
    pub fn new(logger: Arc<CourierLogger>, max_level: log::LevelFilter) -> Self {
        Self { logger, max_level }
    }
}

fn map_log_level(level: log::Level) -> CourierLevel {
    match level {
        log::Level::Error => CourierLevel::Error,
        log::Level::Warn => CourierLevel::Warning,
        log::Level::Info | log::Level::Debug | log::Level::Trace => CourierLevel::Info,
    }
}

impl From<log::Level> for CourierLevel {
    fn from(level: log::Level) -> Self {
        map_log_level(level)
    }
}

fn normalise_target(target: &str) -> Cow<'_, str> {
    if target.contains("::") {
        Cow::Owned(target.replace("::", "."))
    } else {
        Cow::Borrowed(target)
    }
}

impl CourierLogAdapter {
    fn to_entry(&self, record: &Record<'_>) -> CourierLogEntry {
        let category = normalise_target(record.target());
        let entry = CourierLogEntry::new(record.args().to_string(), record.level().into(), category);
        match (record.file(), record.line()) {
            (Some(file), Some(line)) if self.logger.trace_level() > 0 => {
                entry.with_traces(vec![StackFrame::new(file, line)])
            }
            _ => entry,
        }
    }
}

impl log::Log for CourierLogAdapter {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.logger.log_entry(self.to_entry(record));
    }

    fn flush(&self) {
        // `log()` already flushed; a failure here has nowhere better to go.
        let _ = self.logger.flush();
    }
}

static INSTALL_RESULT: OnceLock<bool> = OnceLock::new();

/// Install `logger` as the global `log` crate backend.
///
/// Returns `true` on success. When a different global logger is already set,
/// installation fails and `false` is returned. Subsequent calls return the
/// cached outcome and ignore their argument.
pub fn install_global_logger(logger: Arc<CourierLogger>, max_level: log::LevelFilter) -> bool {
    *INSTALL_RESULT.get_or_init(|| {
        let adapter: &'static CourierLogAdapter = Box::leak(Box::new(CourierLogAdapter::new(logger, max_level)));
        if log::set_logger(adapter).is_err() {
            return false;
        }
        log::set_max_level(max_level);
        true
    })
}
