use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Minimum interval between two export failure warnings.
pub const WARN_RATE_LIMIT_SECS: u64 = 5;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Helper that rate limits warnings about failed log exports.
///
/// The logger calls [`record_failure`](Self::record_failure) whenever an
/// export triggered by `log()` fails. [`warn_if_due`](Self::warn_if_due)
/// reports the accumulated count through the provided callback at most once
/// per interval; [`flush`](Self::flush) reports anything still pending.
///
/// The interval is claimed before the callback runs, so a callback that
/// itself ends up logging cannot trigger a second warning.
#[derive(Default)]
pub struct RateLimitedWarner {
    last_warn: AtomicU64,
    failures: AtomicU64,
}

impl RateLimitedWarner {
    /// Create a warner whose first warning is emitted immediately.
    pub fn new() -> Self {
        Self {
            last_warn: AtomicU64::new(now_secs().saturating_sub(WARN_RATE_LIMIT_SECS)),
            failures: AtomicU64::new(0),
        }
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of failures not yet reported.
    pub fn pending(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Report pending failures if the interval has elapsed.
    pub fn warn_if_due(&self, mut warn: impl FnMut(u64)) {
        let now = now_secs();
        let prev = self.last_warn.load(Ordering::Relaxed);
        if now.saturating_sub(prev) < WARN_RATE_LIMIT_SECS {
            return;
        }
        if self
            .last_warn
            .compare_exchange(prev, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let count = self.failures.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
        }
    }

    /// Report pending failures immediately.
    pub fn flush(&self, mut warn: impl FnMut(u64)) {
        let count = self.failures.swap(0, Ordering::Relaxed);
        if count > 0 {
            self.last_warn.store(now_secs(), Ordering::Relaxed);
            warn(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_is_reported_immediately() {
        let warner = RateLimitedWarner::new();
        let mut warnings = Vec::new();
        warner.record_failure();
        warner.warn_if_due(|c| warnings.push(c));
        assert_eq!(warnings, vec![1]);
    }

    #[test]
    fn later_failures_wait_for_the_interval() {
        let warner = RateLimitedWarner::new();
        let mut warnings = Vec::new();
        warner.record_failure();
        warner.warn_if_due(|c| warnings.push(c));
        warner.record_failure();
        warner.record_failure();
        warner.warn_if_due(|c| warnings.push(c));
        assert_eq!(warnings, vec![1]);
        assert_eq!(warner.pending(), 2);
    }

    #[test]
    fn flush_reports_pending_failures() {
        let warner = RateLimitedWarner::new();
        let mut warnings = Vec::new();
        warner.record_failure();
        warner.warn_if_due(|_| {});
        warner.record_failure();
        warner.flush(|c| warnings.push(c));
        assert_eq!(warnings, vec![1]);
        assert_eq!(warner.pending(), 0);
    }

    #[test]
    fn reentrant_callback_does_not_warn_twice() {
        let warner = RateLimitedWarner::new();
        let mut calls = 0;
        warner.record_failure();
        warner.warn_if_due(|_| {
            calls += 1;
            warner.record_failure();
            warner.warn_if_due(|_| calls += 1);
        });
        assert_eq!(calls, 1);
    }
}
