//! Export targets for buffered log entries.
//!
//! [`file`] appends batches to a single locked file; [`rotating`] layers
//! size-based rollover on top of it.

pub mod file;
pub mod rotating;

pub use file::{CourierFileHandler, FileHandlerConfig};
pub use rotating::{CourierRotatingFileHandler, RotationConfig};
