//! Queue to HTTP delivery bridge.
//!
//! Messages consumed from a work queue are decoded as JSON objects and
//! POSTed as form data to a configured endpoint. A failed delivery is
//! requeued with an incremented `iteration` counter until the retry limit
//! is reached. Every step is recorded through [`CourierLogger`], a buffered
//! logger exporting to a rotating file under an exclusive lock.

pub mod config;
pub mod delivery_client;
pub mod delivery_handler;
pub mod filters;
pub mod formatter;
pub mod handler;
pub mod handlers;
pub mod level;
pub mod log_compat;
pub mod log_entry;
pub mod logger;
pub mod payload;
pub mod queue;
mod rate_limited_warner;
pub mod trace;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use config::{
    ApplicationConfig, CommandConfig, ConfigError, CourierConfig, DEFAULT_RETRY_LIMIT, LoggerConfig,
    QueueConfig, RequestConfig, load_config, parse_config,
};
pub use delivery_client::{DeliveryClient, HttpDeliveryClient};
pub use delivery_handler::{DeliveryHandler, MessageError, Outcome};
pub use filters::filter_entries;
pub use formatter::{CourierFormatter, DefaultFormatter};
pub use handler::{CourierHandlerTrait, HandlerError};
pub use handlers::{CourierFileHandler, CourierRotatingFileHandler, FileHandlerConfig, RotationConfig};
pub use level::{CourierLevel, LevelMask, LevelParseError};
pub use log_compat::{CourierLogAdapter, install_global_logger};
pub use log_entry::CourierLogEntry;
pub use logger::CourierLogger;
pub use payload::{ITERATION_KEY, Payload, PayloadError};
#[cfg(feature = "amqp")]
pub use queue::AmqpQueue;
pub use queue::{
    AckFailure, Acknowledger, ConsumerControl, ConsumerState, Delivery, InMemoryQueue, QueueClient, QueueError,
};
pub use trace::StackFrame;
