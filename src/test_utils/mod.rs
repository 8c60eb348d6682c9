//! Helpers shared by unit tests, integration tests and benches.
//!
//! Compiled for `cfg(test)` and behind the `test-util` feature, which the
//! crate enables on itself as a dev-dependency.

pub mod collecting_handler;
pub mod scripted_client;

pub use collecting_handler::{CollectingHandler, FailingHandler};
pub use scripted_client::ScriptedDeliveryClient;

use std::sync::Arc;

use crate::logger::CourierLogger;

/// Logger wired to a fresh [`CollectingHandler`], with tracing disabled.
pub fn collecting_logger() -> (Arc<CourierLogger>, CollectingHandler) {
    let handler = CollectingHandler::new();
    let logger = CourierLogger::new(Arc::new(handler.clone()));
    logger.set_trace_level(0);
    (Arc::new(logger), handler)
}
