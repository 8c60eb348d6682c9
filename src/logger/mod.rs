//! Buffered audit logger.
//!
//! [`CourierLogger`] keeps entries in memory, filters them by level bitmask
//! and category lists, and exports the survivors through a single
//! [`CourierHandlerTrait`]. Every call to [`CourierLogger::log`] flushes
//! immediately so nothing is lost if the process dies between messages.
//!
//! Exports may themselves emit `log` crate diagnostics (for example a failed
//! unlock). When the `log_compat` bridge routes those back into the same
//! logger they are only buffered; a per-thread guard stops them from
//! re-entering the export path.

use std::cell::Cell;
use std::mem;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use log::warn;
use parking_lot::{Mutex, RwLock};

use crate::config::LoggerConfig;
use crate::filters::filter_entries;
use crate::formatter::DefaultFormatter;
use crate::handler::{CourierHandlerTrait, HandlerError};
use crate::handlers::{CourierRotatingFileHandler, FileHandlerConfig, RotationConfig};
use crate::level::{CourierLevel, LevelMask, LevelParseError};
use crate::log_entry::CourierLogEntry;
use crate::rate_limited_warner::RateLimitedWarner;
use crate::trace;

/// Number of stack frames recorded per entry unless configured otherwise.
pub const DEFAULT_TRACE_LEVEL: usize = 10;

thread_local! {
    static EXPORTING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside flush/export until dropped.
struct ExportGuard;

impl ExportGuard {
    fn enter() -> Option<Self> {
        EXPORTING.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self)
            }
        })
    }
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        EXPORTING.with(|flag| flag.set(false));
    }
}

/// Buffered, filtering logger shared by every pipeline component.
pub struct CourierLogger {
    entries: Mutex<Vec<CourierLogEntry>>,
    /// Filtered entries awaiting export. Holding this lock serialises
    /// flushes so batches reach the handler in FIFO order.
    pending: Mutex<Vec<CourierLogEntry>>,
    handler: Arc<dyn CourierHandlerTrait>,
    levels: AtomicU8,
    categories: RwLock<Vec<String>>,
    except: RwLock<Vec<String>>,
    trace_level: AtomicUsize,
    export_warner: RateLimitedWarner,
}

impl CourierLogger {
    /// Create a logger exporting through `handler` with no filtering.
    pub fn new(handler: Arc<dyn CourierHandlerTrait>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            handler,
            levels: AtomicU8::new(LevelMask::ALL.bits()),
            categories: RwLock::new(Vec::new()),
            except: RwLock::new(Vec::new()),
            trace_level: AtomicUsize::new(DEFAULT_TRACE_LEVEL),
            export_warner: RateLimitedWarner::new(),
        }
    }

    /// Build a logger writing to a rotating file as described by `config`.
    pub fn from_config(config: &LoggerConfig) -> Result<Self, HandlerError> {
        let file_config = FileHandlerConfig {
            file_mode: config.file_mode,
            dir_mode: config.dir_mode,
        };
        let rotation = RotationConfig::from_megabytes(config.max_file_size, config.max_log_files);
        let handler =
            CourierRotatingFileHandler::with_config(&config.log_file, DefaultFormatter, file_config, rotation)?;
        let logger = Self::new(Arc::new(handler));
        logger.set_level_mask(config.levels);
        logger.set_categories(config.categories.clone());
        logger.set_except(config.except.clone());
        logger.set_trace_level(config.trace_level);
        Ok(logger)
    }

    /// Record `text` and flush.
    ///
    /// The call site is recorded as the first trace frame. Export failures
    /// are counted and reported through the `log` crate at most once per
    /// interval; they never propagate to the caller.
    #[track_caller]
    pub fn log(&self, text: impl Into<String>, level: CourierLevel, category: &str) {
        let caller = Location::caller();
        let depth = self.trace_level();
        let entry = CourierLogEntry::new(text, level, category).with_traces(trace::capture(caller, depth));
        self.log_entry(entry);
    }

    /// Append a prepared entry and flush.
    pub fn log_entry(&self, entry: CourierLogEntry) {
        self.entries.lock().push(entry);
        let Some(_guard) = ExportGuard::enter() else {
            return;
        };
        if let Err(err) = self.flush_inner() {
            self.export_warner.record_failure();
            self.export_warner.warn_if_due(|count| {
                warn!("CourierLogger: {count} log export(s) failed; latest error: {err}");
            });
        }
    }

    /// Swap out the buffered entries and pass them to [`collect`](Self::collect).
    ///
    /// Flushing an empty buffer does nothing. Called from inside an export on
    /// the same thread it leaves the buffer untouched for the next flush.
    pub fn flush(&self) -> Result<(), HandlerError> {
        let Some(_guard) = ExportGuard::enter() else {
            return Ok(());
        };
        self.flush_inner()
    }

    /// Filter `entries` and export whatever survives.
    pub fn collect(&self, entries: Vec<CourierLogEntry>) -> Result<(), HandlerError> {
        let Some(_guard) = ExportGuard::enter() else {
            self.entries.lock().extend(entries);
            return Ok(());
        };
        let mut pending = self.pending.lock();
        self.collect_into(&mut pending, entries)
    }

    /// Hand the export buffer to the handler. The buffer is cleared whether
    /// or not the export succeeds.
    pub fn export(&self) -> Result<(), HandlerError> {
        let Some(_guard) = ExportGuard::enter() else {
            return Ok(());
        };
        let mut pending = self.pending.lock();
        self.export_pending(&mut pending)
    }

    fn flush_inner(&self) -> Result<(), HandlerError> {
        let mut pending = self.pending.lock();
        let entries = mem::take(&mut *self.entries.lock());
        if entries.is_empty() {
            return Ok(());
        }
        self.collect_into(&mut pending, entries)
    }

    fn collect_into(
        &self,
        pending: &mut Vec<CourierLogEntry>,
        entries: Vec<CourierLogEntry>,
    ) -> Result<(), HandlerError> {
        let kept = filter_entries(
            entries,
            self.level_mask(),
            &self.categories.read(),
            &self.except.read(),
        );
        if kept.is_empty() {
            return Ok(());
        }
        pending.extend(kept);
        self.export_pending(pending)
    }

    fn export_pending(&self, pending: &mut Vec<CourierLogEntry>) -> Result<(), HandlerError> {
        let batch = mem::take(pending);
        if batch.is_empty() {
            return Ok(());
        }
        self.handler.export(&batch)
    }

    /// Update the level filter from names (`"error,warning"`) or a bitmask.
    pub fn set_levels(&self, levels: &str) -> Result<(), LevelParseError> {
        let mask: LevelMask = levels.parse()?;
        self.set_level_mask(mask);
        Ok(())
    }

    pub fn set_level_mask(&self, mask: LevelMask) {
        self.levels.store(mask.bits(), Ordering::Relaxed);
    }

    pub fn level_mask(&self) -> LevelMask {
        // Only masks validated by `LevelMask` are ever stored.
        LevelMask::from_bits(self.levels.load(Ordering::Relaxed)).unwrap_or(LevelMask::ALL)
    }

    /// Replace the category allow-list. Empty admits every category.
    pub fn set_categories(&self, categories: Vec<String>) {
        *self.categories.write() = categories;
    }

    /// Replace the category deny-list.
    pub fn set_except(&self, except: Vec<String>) {
        *self.except.write() = except;
    }

    pub fn set_trace_level(&self, depth: usize) {
        self.trace_level.store(depth, Ordering::Relaxed);
    }

    pub fn trace_level(&self) -> usize {
        self.trace_level.load(Ordering::Relaxed)
    }

    /// Number of entries buffered but not yet flushed.
    pub fn buffered(&self) -> usize {
        self.entries.lock().len()
    }

    /// Access the export target, mainly for downcasting in tests.
    pub fn handler(&self) -> &Arc<dyn CourierHandlerTrait> {
        &self.handler
    }
}

impl Drop for CourierLogger {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!("CourierLogger: final flush failed: {err}");
        }
        self.export_warner.flush(|count| {
            warn!("CourierLogger: {count} log export(s) failed since the last report");
        });
    }
}

#[cfg(test)]
mod logger_tests;
