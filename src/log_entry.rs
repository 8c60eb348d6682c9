//! Log entry representation for the audit logger.
//!
//! A [`CourierLogEntry`] captures the message together with the context known
//! at the time `log()` was called: wall-clock timestamp, call-site frames and
//! the resident memory of the process.

use std::fmt;
use std::fs;
use std::time::SystemTime;

use crate::level::CourierLevel;
use crate::trace::StackFrame;

/// Category assigned when callers do not provide one.
pub const DEFAULT_CATEGORY: &str = "application";

#[derive(Clone, Debug)]
pub struct CourierLogEntry {
    /// The log message content.
    pub text: String,
    pub level: CourierLevel,
    /// Free-form category used for allow/deny filtering.
    pub category: String,
    /// Time the entry was created.
    pub timestamp: SystemTime,
    /// Call-site frames, innermost first. Empty when tracing is disabled.
    pub traces: Vec<StackFrame>,
    /// Resident memory of the process in bytes, `0` when unknown.
    pub memory_usage: u64,
}

impl CourierLogEntry {
    /// Construct an entry stamped with the current time and memory usage.
    pub fn new(text: impl Into<String>, level: CourierLevel, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level,
            category: category.into(),
            timestamp: SystemTime::now(),
            traces: Vec::new(),
            memory_usage: current_memory_usage(),
        }
    }

    pub fn with_traces(mut self, traces: Vec<StackFrame>) -> Self {
        self.traces = traces;
        self
    }
}

impl fmt::Display for CourierLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}] {}", self.level, self.category, self.text)
    }
}

/// Resident set size of the current process.
///
/// Reads `VmRSS` from `/proc/self/status`; platforms without procfs report 0.
pub fn current_memory_usage() -> u64 {
    fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| parse_vm_rss(&status))
        .unwrap_or(0)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kib * 1024)
}
