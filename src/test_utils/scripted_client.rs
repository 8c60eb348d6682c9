//! Delivery client with scripted outcomes.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::delivery_client::DeliveryClient;
use crate::payload::Payload;

/// Returns queued outcomes in order, then `fallback`, recording every form.
#[derive(Clone)]
pub struct ScriptedDeliveryClient {
    outcomes: Arc<Mutex<VecDeque<bool>>>,
    fallback: bool,
    sent: Arc<Mutex<Vec<Payload>>>,
}

impl ScriptedDeliveryClient {
    /// Client that always answers `outcome`.
    pub fn always(outcome: bool) -> Self {
        Self::scripted([], outcome)
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into_iter().collect())),
            fallback,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Forms received so far.
    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().clone()
    }
}

impl DeliveryClient for ScriptedDeliveryClient {
    fn send(&self, form: &Payload) -> bool {
        self.sent.lock().push(form.clone());
        self.outcomes.lock().pop_front().unwrap_or(self.fallback)
    }
}
