//! Unit tests for CourierLogger.

use super::*;
use crate::test_utils::{CollectingHandler, FailingHandler};
use logtest::Logger;
use rstest::{fixture, rstest};
use serial_test::serial;
use std::any::Any;
use tempfile::tempdir;

#[fixture]
fn collecting() -> (CourierLogger, CollectingHandler) {
    let handler = CollectingHandler::new();
    let logger = CourierLogger::new(Arc::new(handler.clone()));
    logger.set_trace_level(0);
    (logger, handler)
}

#[rstest]
fn log_flushes_immediately(collecting: (CourierLogger, CollectingHandler)) {
    let (logger, handler) = collecting;
    logger.log("first", CourierLevel::Info, "application");
    assert_eq!(handler.texts(), vec!["first"]);
    assert_eq!(logger.buffered(), 0);
    logger.log("second", CourierLevel::Error, "queue");
    assert_eq!(handler.texts(), vec!["first", "second"]);
    assert_eq!(handler.batches(), 2);
}

#[rstest]
fn flush_of_empty_buffer_is_a_no_op(collecting: (CourierLogger, CollectingHandler)) {
    let (logger, handler) = collecting;
    logger.flush().expect("empty flush succeeds");
    logger.flush().expect("empty flush succeeds");
    assert_eq!(handler.batches(), 0);
}

#[rstest]
fn level_mask_filters_entries(collecting: (CourierLogger, CollectingHandler)) {
    let (logger, handler) = collecting;
    logger.set_levels("error").expect("valid levels");
    logger.log("boom", CourierLevel::Error, "application");
    logger.log("fyi", CourierLevel::Info, "application");
    logger.log("careful", CourierLevel::Warning, "application");
    assert_eq!(handler.texts(), vec!["boom"]);
}

#[rstest]
fn filtered_batches_do_not_reach_the_handler(collecting: (CourierLogger, CollectingHandler)) {
    let (logger, handler) = collecting;
    logger.set_level_mask(CourierLevel::Error.into());
    logger.log("fyi", CourierLevel::Info, "application");
    assert_eq!(handler.batches(), 0);
}

#[rstest]
#[case("warning,info", 0x06)]
#[case("1", 0x01)]
#[case("0", 0x00)]
fn set_levels_accepts_names_and_masks(
    collecting: (CourierLogger, CollectingHandler),
    #[case] levels: &str,
    #[case] bits: u8,
) {
    let (logger, _handler) = collecting;
    logger.set_levels(levels).expect("valid levels");
    assert_eq!(logger.level_mask().bits(), bits);
}

#[rstest]
#[case("verbose")]
#[case("16")]
fn set_levels_rejects_unknown_values(collecting: (CourierLogger, CollectingHandler), #[case] levels: &str) {
    let (logger, _handler) = collecting;
    logger.set_levels("error").expect("valid levels");
    assert!(logger.set_levels(levels).is_err());
    assert_eq!(logger.level_mask(), LevelMask::from(CourierLevel::Error));
}

#[rstest]
fn categories_and_except_lists_apply(collecting: (CourierLogger, CollectingHandler)) {
    let (logger, handler) = collecting;
    logger.set_categories(vec!["queue*".to_owned(), "application".to_owned()]);
    logger.set_except(vec!["queue.noisy".to_owned()]);
    logger.log("kept", CourierLevel::Info, "queue.amqp");
    logger.log("dropped", CourierLevel::Info, "queue.noisy");
    logger.log("also kept", CourierLevel::Info, "application");
    logger.log("not listed", CourierLevel::Info, "request");
    assert_eq!(handler.texts(), vec!["kept", "also kept"]);
}

#[rstest]
fn collect_filters_and_exports(collecting: (CourierLogger, CollectingHandler)) {
    let (logger, handler) = collecting;
    logger.set_level_mask(CourierLevel::Warning.into());
    logger
        .collect(vec![
            CourierLogEntry::new("a", CourierLevel::Warning, "application"),
            CourierLogEntry::new("b", CourierLevel::Info, "application"),
            CourierLogEntry::new("c", CourierLevel::Warning, "application"),
        ])
        .expect("collect succeeds");
    assert_eq!(handler.texts(), vec!["a", "c"]);
    assert_eq!(handler.batches(), 1);
    logger.export().expect("export of empty buffer succeeds");
    assert_eq!(handler.batches(), 1);
}

#[rstest]
fn trace_level_limits_captured_frames(collecting: (CourierLogger, CollectingHandler)) {
    let (logger, handler) = collecting;
    logger.set_trace_level(1);
    logger.log("traced", CourierLevel::Info, "application");
    logger.set_trace_level(0);
    logger.log("untraced", CourierLevel::Info, "application");

    let entries = handler.collected();
    assert_eq!(entries[0].traces.len(), 1);
    assert!(entries[0].traces[0].filename.ends_with("logger_tests.rs"));
    assert!(entries[1].traces.is_empty());
}

#[rstest]
fn explicit_flush_reports_export_errors() {
    let handler = FailingHandler::new();
    let logger = CourierLogger::new(Arc::new(handler.clone()));
    logger
        .collect(vec![CourierLogEntry::new("lost", CourierLevel::Error, "application")])
        .expect_err("export fails");
    assert_eq!(handler.attempts(), 1);
    logger.export().expect("buffer was cleared by the failed attempt");
    assert_eq!(handler.attempts(), 1);
}

#[rstest]
#[serial]
fn log_swallows_export_errors_and_warns_once() {
    let mut captured = Logger::start();
    let handler = FailingHandler::new();
    let logger = CourierLogger::new(Arc::new(handler.clone()));
    logger.set_trace_level(0);

    logger.log("one", CourierLevel::Info, "application");
    logger.log("two", CourierLevel::Info, "application");

    assert_eq!(handler.attempts(), 2);
    let warnings = std::iter::from_fn(|| captured.pop())
        .filter(|record| record.args().contains("log export(s) failed"))
        .count();
    assert_eq!(warnings, 1);
}

/// Handler that logs through the `log` crate while exporting and checks the
/// logger is not re-entered.
struct ReentrantHandler {
    inner: CollectingHandler,
    logger: parking_lot::Mutex<Option<std::sync::Weak<CourierLogger>>>,
}

impl CourierHandlerTrait for ReentrantHandler {
    fn export(&self, entries: &[CourierLogEntry]) -> Result<(), HandlerError> {
        self.inner.export(entries)?;
        if let Some(logger) = self.logger.lock().as_ref().and_then(std::sync::Weak::upgrade) {
            logger.log("emitted during export", CourierLevel::Warning, "diagnostics");
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[rstest]
fn entries_logged_during_export_are_buffered() {
    let collecting = CollectingHandler::new();
    let handler = Arc::new(ReentrantHandler {
        inner: collecting.clone(),
        logger: parking_lot::Mutex::new(None),
    });
    let logger = Arc::new(CourierLogger::new(handler.clone()));
    logger.set_trace_level(0);
    *handler.logger.lock() = Some(Arc::downgrade(&logger));

    logger.log("outer", CourierLevel::Info, "application");
    assert_eq!(collecting.texts(), vec!["outer"]);
    assert_eq!(logger.buffered(), 1);

    logger.flush().expect("flush succeeds");
    assert_eq!(collecting.texts(), vec!["outer", "emitted during export"]);
    assert_eq!(logger.buffered(), 1);
}

#[rstest]
fn drop_flushes_buffered_entries() {
    let collecting = CollectingHandler::new();
    let handler = Arc::new(ReentrantHandler {
        inner: collecting.clone(),
        logger: parking_lot::Mutex::new(None),
    });
    let logger = Arc::new(CourierLogger::new(handler.clone()));
    logger.set_trace_level(0);
    *handler.logger.lock() = Some(Arc::downgrade(&logger));
    logger.log("outer", CourierLevel::Info, "application");
    assert_eq!(logger.buffered(), 1);

    drop(logger);

    assert_eq!(collecting.texts(), vec!["outer", "emitted during export"]);
}

#[rstest]
fn from_config_writes_rotating_file() {
    let dir = tempdir().expect("tempdir");
    let config = LoggerConfig {
        log_file: dir.path().join("logs/app.log"),
        levels: LevelMask::from(CourierLevel::Error),
        trace_level: 0,
        ..LoggerConfig::default()
    };
    let logger = CourierLogger::from_config(&config).expect("logger builds");
    logger.log("written", CourierLevel::Error, "application");
    logger.log("filtered", CourierLevel::Info, "application");

    let contents = std::fs::read_to_string(&config.log_file).expect("log file exists");
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.trim_end().ends_with("[error][application] written"));
    let rotating = logger
        .handler()
        .as_any()
        .downcast_ref::<CourierRotatingFileHandler>()
        .expect("rotating handler");
    assert_eq!(rotating.rotation_limits(), (10 * 1_048_576, 5));
}
