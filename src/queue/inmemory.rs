//! Process-local queue adapter.
//!
//! Queues are FIFO byte buffers keyed by name. Every publish and resolution
//! is recorded so callers can assert on the exact broker traffic. A nacked
//! message goes back to the front of its queue, the way a broker redelivers
//! a rejected message first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::{
    Acknowledger, ConsumerControl, Delivery, QueueClient, QueueError, log_published, run_consumer,
};
use crate::logger::CourierLogger;
use crate::payload::Payload;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A message accepted by [`InMemoryQueue::publish`].
#[derive(Clone, Debug, PartialEq)]
pub struct Published {
    pub queue: String,
    pub payload: Payload,
    pub exchange: String,
    pub delay: Duration,
}

/// How a delivery was resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Acked { queue: String, body: Vec<u8> },
    Nacked { queue: String, body: Vec<u8>, requeue: bool },
}

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<(Vec<u8>, bool)>>,
    published: Vec<Published>,
    resolutions: Vec<Resolution>,
    fail_publish: bool,
    fail_ack: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    available: Condvar,
}

/// In-process [`QueueClient`].
#[derive(Clone)]
pub struct InMemoryQueue {
    shared: Arc<Shared>,
    logger: Arc<CourierLogger>,
    poll_interval: Duration,
}

impl InMemoryQueue {
    pub fn new(logger: Arc<CourierLogger>) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            logger,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Enqueue a raw body, bypassing JSON encoding.
    pub fn push(&self, queue: &str, body: impl Into<Vec<u8>>) {
        let mut state = self.shared.state.lock();
        state
            .queues
            .entry(queue.to_owned())
            .or_default()
            .push_back((body.into(), false));
        self.shared.available.notify_all();
    }

    /// Make every following ack fail. Nacks still succeed.
    pub fn fail_acks(&self, fail: bool) {
        self.shared.state.lock().fail_ack = fail;
    }

    /// Make every following publish fail, simulating a broker outage.
    pub fn fail_publishes(&self, fail: bool) {
        self.shared.state.lock().fail_publish = fail;
    }

    /// Messages waiting in `queue`.
    pub fn len(&self, queue: &str) -> usize {
        self.shared
            .state
            .lock()
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    pub fn published(&self) -> Vec<Published> {
        self.shared.state.lock().published.clone()
    }

    pub fn resolutions(&self) -> Vec<Resolution> {
        self.shared.state.lock().resolutions.clone()
    }

    fn next_delivery(&self, queue: &str, wait: Duration) -> Option<Delivery> {
        let mut state = self.shared.state.lock();
        if state.queues.get(queue).is_none_or(VecDeque::is_empty) {
            self.shared.available.wait_for(&mut state, wait);
        }
        let (body, redelivered) = state.queues.get_mut(queue)?.pop_front()?;
        let acker = InMemoryAcker {
            shared: Arc::clone(&self.shared),
            queue: queue.to_owned(),
            body: body.clone(),
        };
        Some(Delivery::new(body, Box::new(acker)).redelivered(redelivered))
    }
}

impl QueueClient for InMemoryQueue {
    fn publish(&self, queue: &str, payload: &Payload, exchange: &str, delay: Duration) -> Result<(), QueueError> {
        {
            let mut state = self.shared.state.lock();
            if state.fail_publish {
                return Err(QueueError::Publish {
                    queue: queue.to_owned(),
                    source: "in-memory broker is refusing publishes".into(),
                });
            }
            state.published.push(Published {
                queue: queue.to_owned(),
                payload: payload.clone(),
                exchange: exchange.to_owned(),
                delay,
            });
            state
                .queues
                .entry(queue.to_owned())
                .or_default()
                .push_back((payload.to_json().into_bytes(), false));
            self.shared.available.notify_all();
        }
        log_published(&self.logger, payload, queue);
        Ok(())
    }

    fn consume(
        &self,
        queue: &str,
        handler: &mut dyn FnMut(Delivery),
        control: &ConsumerControl,
    ) -> Result<(), QueueError> {
        run_consumer(
            &self.logger,
            queue,
            control,
            self.poll_interval,
            |wait| Ok(self.next_delivery(queue, wait)),
            handler,
        )
    }
}

struct InMemoryAcker {
    shared: Arc<Shared>,
    queue: String,
    body: Vec<u8>,
}

impl Acknowledger for InMemoryAcker {
    fn ack(&mut self) -> Result<(), QueueError> {
        let mut state = self.shared.state.lock();
        if state.fail_ack {
            return Err(QueueError::Resolve("in-memory broker is refusing acks".into()));
        }
        state.resolutions.push(Resolution::Acked {
            queue: self.queue.clone(),
            body: self.body.clone(),
        });
        Ok(())
    }

    fn nack(self: Box<Self>, requeue: bool) -> Result<(), QueueError> {
        let InMemoryAcker { shared, queue, body } = *self;
        let mut state = shared.state.lock();
        if requeue {
            state
                .queues
                .entry(queue.clone())
                .or_default()
                .push_front((body.clone(), true));
            shared.available.notify_all();
        }
        state.resolutions.push(Resolution::Nacked { queue, body, requeue });
        Ok(())
    }
}
