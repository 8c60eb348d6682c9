use chrono::{DateTime, Local};

use crate::log_entry::CourierLogEntry;

/// Timestamp layout used at the start of every log line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Trait for formatting log entries into strings.
///
/// Implementors must be thread-safe (`Send + Sync`) so formatters can be
/// shared across threads in a logging system.
pub trait CourierFormatter: Send + Sync {
    /// Format a log entry into its textual representation, without a trailing
    /// newline.
    fn format(&self, entry: &CourierLogEntry) -> String;

    /// Format a batch as newline separated entries with a trailing newline.
    fn format_batch(&self, entries: &[CourierLogEntry]) -> String {
        let mut text = entries
            .iter()
            .map(|entry| self.format(entry))
            .collect::<Vec<_>>()
            .join("\n");
        text.push('\n');
        text
    }
}

/// `YYYY-MM-DD HH:MM:SS [level][category] text`, followed by one indented
/// `in <file>:<line>` line per captured frame. Timestamps use local time.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultFormatter;

impl CourierFormatter for DefaultFormatter {
    fn format(&self, entry: &CourierLogEntry) -> String {
        let timestamp = DateTime::<Local>::from(entry.timestamp).format(TIMESTAMP_FORMAT);
        let mut line = format!(
            "{timestamp} [{}][{}] {}",
            entry.level, entry.category, entry.text
        );
        for frame in &entry.traces {
            line.push_str("\n    ");
            line.push_str(&frame.to_string());
        }
        line
    }
}
