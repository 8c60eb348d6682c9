//! In-memory export targets for test assertions.

use crate::handler::{CourierHandlerTrait, HandlerError};
use crate::log_entry::CourierLogEntry;
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Handler that stores every exported entry for later inspection.
///
/// Clones share storage, so a test can keep one clone while the logger owns
/// another.
#[derive(Clone, Default)]
pub struct CollectingHandler {
    entries: Arc<Mutex<Vec<CourierLogEntry>>>,
    batches: Arc<AtomicUsize>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry exported so far.
    pub fn collected(&self) -> Vec<CourierLogEntry> {
        self.entries.lock().clone()
    }

    /// Exported entry texts, in order.
    pub fn texts(&self) -> Vec<String> {
        self.entries.lock().iter().map(|entry| entry.text.clone()).collect()
    }

    /// Number of `export` calls received.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Whether any exported text contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|entry| entry.text.contains(needle))
    }
}

impl CourierHandlerTrait for CollectingHandler {
    fn export(&self, entries: &[CourierLogEntry]) -> Result<(), HandlerError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().extend_from_slice(entries);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handler whose every export fails, counting attempts.
#[derive(Clone, Default)]
pub struct FailingHandler {
    attempts: Arc<AtomicUsize>,
}

impl FailingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl CourierHandlerTrait for FailingHandler {
    fn export(&self, _entries: &[CourierLogEntry]) -> Result<(), HandlerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(HandlerError::Write {
            path: PathBuf::from("unwritable.log"),
            source: io::Error::other("disk full"),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
