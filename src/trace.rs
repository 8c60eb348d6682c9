//! Call-site frame capture for log entries.
//!
//! Frames come from two sources: the `#[track_caller]` location of the
//! `log()` call, which is always available, and a captured backtrace, which
//! only resolves file and line information when debug info is present.
//! Frames belonging to the logging machinery or the standard library are
//! removed before the list is truncated to the configured depth.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;

/// Path and symbol fragments identifying frames that are never useful in an
/// application trace.
pub const LOGGING_INFRA_PATTERNS: &[&str] = &[
    "/rustc/",
    "/library/std/",
    "/library/core/",
    "/library/alloc/",
    "std::",
    "core::",
    "alloc::",
    "courier::trace::",
    "courier::logger::",
    "courier::log_compat::",
    "log::__private_api",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub filename: String,
    pub line: u32,
    pub function: Option<String>,
}

impl StackFrame {
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            function: None,
        }
    }

    fn from_location(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }

    fn is_infrastructure(&self) -> bool {
        LOGGING_INFRA_PATTERNS.iter().any(|pattern| {
            self.filename.contains(pattern)
                || self
                    .function
                    .as_deref()
                    .is_some_and(|function| function.starts_with(pattern))
        })
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in {}:{}", self.filename, self.line)
    }
}

/// Collect up to `depth` frames, starting with `caller`.
pub fn capture(caller: &Location<'_>, depth: usize) -> Vec<StackFrame> {
    if depth == 0 {
        return Vec::new();
    }
    let first = StackFrame::from_location(caller);
    let rendered = Backtrace::force_capture().to_string();
    let rest: Vec<StackFrame> = parse_backtrace(&rendered)
        .into_iter()
        .filter(|frame| !frame.is_infrastructure())
        .filter(|frame| frame.filename != first.filename || frame.line != first.line)
        .collect();
    let mut frames = vec![first];
    frames.extend(rest);
    limit_frames(frames, depth)
}

/// Keep the first `n` frames, innermost first.
pub fn limit_frames(mut frames: Vec<StackFrame>, n: usize) -> Vec<StackFrame> {
    frames.truncate(n);
    frames
}

/// Parse the textual rendering of a [`Backtrace`].
///
/// Each frame is rendered as a numbered symbol line optionally followed by an
/// `at <file>:<line>:<col>` line. Frames without a location are skipped.
pub(crate) fn parse_backtrace(rendered: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut function: Option<String> = None;
    for line in rendered.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(mut frame) = parse_location(location) {
                frame.function = function.clone();
                frames.push(frame);
            }
            continue;
        }
        if let Some((index, symbol)) = trimmed.split_once(": ")
            && index.chars().all(|c| c.is_ascii_digit())
        {
            function = Some(strip_hash(symbol).to_owned());
        }
    }
    frames
}

fn parse_location(location: &str) -> Option<StackFrame> {
    let mut parts = location.rsplitn(3, ':');
    let _column = parts.next()?;
    let line = parts.next()?.parse().ok()?;
    let file = parts.next()?;
    Some(StackFrame::new(file, line))
}

fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = "   0: std::backtrace_rs::backtrace::libunwind::trace
             at /rustc/abc/library/std/src/../../backtrace/src/backtrace/libunwind.rs:116:5
   1: courier::logger::CourierLogger::log
             at ./src/logger/mod.rs:120:9
   2: courier::delivery_handler::DeliveryHandler<Q,D>::on_message::h0123456789abcdef
             at ./src/delivery_handler/mod.rs:88:13
   3: main
";

    #[test]
    fn parses_frames_with_locations() {
        let frames = parse_backtrace(RENDERED);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].filename, "./src/delivery_handler/mod.rs");
        assert_eq!(frames[2].line, 88);
        assert_eq!(
            frames[2].function.as_deref(),
            Some("courier::delivery_handler::DeliveryHandler<Q,D>::on_message")
        );
    }

    #[test]
    fn infrastructure_frames_are_recognised() {
        let frames = parse_backtrace(RENDERED);
        let kept: Vec<_> = frames.iter().filter(|f| !f.is_infrastructure()).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].line, 88);
    }

    #[test]
    fn capture_starts_with_call_site() {
        let caller = Location::caller();
        let frames = capture(caller, 3);
        assert!(!frames.is_empty());
        assert!(frames.len() <= 3);
        assert_eq!(frames[0].line, caller.line());
    }

    #[test]
    fn zero_depth_captures_nothing() {
        assert!(capture(Location::caller(), 0).is_empty());
    }

    #[test]
    fn frame_display_matches_log_format() {
        assert_eq!(StackFrame::new("src/app.rs", 7).to_string(), "in src/app.rs:7");
    }
}
