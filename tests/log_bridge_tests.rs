//! `log` crate records reach the audit log once the bridge is installed.
//!
//! Lives in its own test binary because it installs the process-wide
//! `log` backend.

use std::sync::Arc;

use courier::test_utils::CollectingHandler;
use courier::{CourierLevel, CourierLogger, install_global_logger};
use rstest::rstest;

#[rstest]
fn installed_bridge_forwards_records() {
    let handler = CollectingHandler::new();
    let logger = Arc::new(CourierLogger::new(Arc::new(handler.clone())));
    logger.set_trace_level(0);

    assert!(install_global_logger(Arc::clone(&logger), log::LevelFilter::Info));
    log::warn!(target: "courier::queue", "broker connection lost");
    log::debug!("below the configured level");

    let entries = handler.collected();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "broker connection lost");
    assert_eq!(entries[0].level, CourierLevel::Warning);
    assert_eq!(entries[0].category, "courier.queue");

    let other = Arc::new(CourierLogger::new(Arc::new(CollectingHandler::new())));
    assert!(install_global_logger(other, log::LevelFilter::Trace));
    assert_eq!(log::max_level(), log::LevelFilter::Info);
}
