//! Rotating file handler module wiring.
//!
//! Core rotation logic lives in [`core`], while the size-based rollover is
//! implemented by [`strategy`].

mod core;
mod strategy;

pub use core::{BYTES_PER_MB, CourierRotatingFileHandler, RotationConfig};
