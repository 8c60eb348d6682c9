//! Cooperative stop token for consumers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsumerState {
    Running = 0,
    /// Stop requested; the in-flight delivery is still being handled.
    Draining = 1,
    Stopped = 2,
}

impl ConsumerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Cloneable handle shared between a consume loop and whoever stops it.
///
/// Transitions only move forward: `Running → Draining → Stopped`.
#[derive(Clone, Debug)]
pub struct ConsumerControl {
    state: Arc<AtomicU8>,
}

impl Default for ConsumerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerControl {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ConsumerState::Running as u8)),
        }
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ConsumerState::Running
    }

    /// Ask the consumer to stop after the current delivery.
    ///
    /// Returns `false` when a stop was already requested.
    pub fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(
                ConsumerState::Running as u8,
                ConsumerState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_stopped(&self) {
        self.state.store(ConsumerState::Stopped as u8, Ordering::Release);
    }
}
