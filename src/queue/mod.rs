//! Work queue transport.
//!
//! [`QueueClient`] is the seam between the pipeline and the broker. Each
//! consumed message arrives as a [`Delivery`] that owns its transport
//! handle; [`Delivery::ack`] and [`Delivery::nack`] take `self`, so a
//! message can be resolved once at most. A refused ack returns the delivery
//! in [`AckFailure`] so the caller can fall back to a nack. Dropping an
//! unresolved delivery is reported as a warning through the `log` crate.
//!
//! Two adapters are provided: [`InMemoryQueue`] for tests and embedding and,
//! with the `amqp` feature, [`AmqpQueue`] over `lapin`.

#[cfg(feature = "amqp")]
mod amqp;
mod control;
mod inmemory;

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use log::warn;
use thiserror::Error;

use crate::level::CourierLevel;
use crate::logger::CourierLogger;
use crate::payload::Payload;

#[cfg(feature = "amqp")]
pub use amqp::AmqpQueue;
pub use control::{ConsumerControl, ConsumerState};
pub use inmemory::{InMemoryQueue, Published, Resolution};

/// Log category for queue activity.
pub const QUEUE_CATEGORY: &str = "queue";

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to connect to the message broker: {0}")]
    Connect(#[source] BoxError),
    #[error("failed to declare queue \"{queue}\": {source}")]
    Declare {
        queue: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to publish to queue \"{queue}\": {source}")]
    Publish {
        queue: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to consume from queue \"{queue}\": {source}")]
    Consume {
        queue: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to resolve delivery: {0}")]
    Resolve(#[source] BoxError),
}

/// Transport handle used to resolve one delivery.
pub trait Acknowledger: Send {
    /// Positive acknowledgement: the broker forgets the message.
    ///
    /// On failure the handle must still accept a [`nack`](Self::nack).
    fn ack(&mut self) -> Result<(), QueueError>;

    /// Negative acknowledgement. With `requeue` the broker redelivers.
    fn nack(self: Box<Self>, requeue: bool) -> Result<(), QueueError>;
}

/// One message handed to a consumer.
pub struct Delivery {
    body: Vec<u8>,
    redelivered: bool,
    acker: Option<Box<dyn Acknowledger>>,
}

impl Delivery {
    pub fn new(body: Vec<u8>, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            body,
            redelivered: false,
            acker: Some(acker),
        }
    }

    pub fn redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the broker delivered this message before.
    pub fn is_redelivered(&self) -> bool {
        self.redelivered
    }

    /// Acknowledge the message.
    ///
    /// A failed acknowledgement hands the delivery back inside the error so
    /// it can still be rejected.
    pub fn ack(mut self) -> Result<(), AckFailure> {
        let Some(mut acker) = self.acker.take() else {
            return Ok(());
        };
        match acker.ack() {
            Ok(()) => Ok(()),
            Err(error) => {
                self.acker = Some(acker);
                Err(AckFailure { error, delivery: self })
            }
        }
    }

    /// Reject the message. With `requeue` the broker redelivers it,
    /// otherwise it is discarded.
    pub fn nack(mut self, requeue: bool) -> Result<(), QueueError> {
        match self.acker.take() {
            Some(acker) => acker.nack(requeue),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("body_len", &self.body.len())
            .field("redelivered", &self.redelivered)
            .field("resolved", &self.acker.is_none())
            .finish()
    }
}

/// Acknowledgement that the transport refused, with the unresolved delivery.
#[derive(Debug, Error)]
#[error("failed to acknowledge delivery")]
pub struct AckFailure {
    #[source]
    pub error: QueueError,
    pub delivery: Delivery,
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if self.acker.is_some() {
            warn!(
                "Delivery dropped without ack or nack ({} byte body); the broker will redeliver it",
                self.body.len()
            );
        }
    }
}

/// Message broker operations used by the pipeline.
pub trait QueueClient: Send + Sync {
    /// Publish `payload` persistently to `queue`.
    ///
    /// `exchange` may be empty for the default exchange. A non-zero `delay`
    /// is attached as an `x-delay` header in milliseconds.
    fn publish(&self, queue: &str, payload: &Payload, exchange: &str, delay: Duration) -> Result<(), QueueError>;

    /// Block, passing each delivery from `queue` to `handler` in turn until
    /// `control` leaves the running state.
    fn consume(
        &self,
        queue: &str,
        handler: &mut dyn FnMut(Delivery),
        control: &ConsumerControl,
    ) -> Result<(), QueueError>;
}

pub(crate) fn log_published(logger: &CourierLogger, payload: &Payload, queue: &str) {
    logger.log(
        format!("Queue message {payload} published to \"{queue}\" queue"),
        CourierLevel::Info,
        QUEUE_CATEGORY,
    );
}

/// Shared consume loop.
///
/// `next` waits up to `poll` for a delivery and returns `None` on timeout, so
/// a stop request is noticed while idle.
pub(crate) fn run_consumer<F>(
    logger: &CourierLogger,
    queue: &str,
    control: &ConsumerControl,
    poll: Duration,
    mut next: F,
    handler: &mut dyn FnMut(Delivery),
) -> Result<(), QueueError>
where
    F: FnMut(Duration) -> Result<Option<Delivery>, QueueError>,
{
    logger.log(
        format!("Consumer started at \"{queue}\" queue"),
        CourierLevel::Info,
        QUEUE_CATEGORY,
    );
    let result = consume_loop(logger, queue, control, poll, &mut next, handler);
    control.mark_stopped();
    result
}

fn consume_loop<F>(
    logger: &CourierLogger,
    queue: &str,
    control: &ConsumerControl,
    poll: Duration,
    next: &mut F,
    handler: &mut dyn FnMut(Delivery),
) -> Result<(), QueueError>
where
    F: FnMut(Duration) -> Result<Option<Delivery>, QueueError>,
{
    while control.is_running() {
        logger.log(
            format!("Consumer waiting for incoming queue messages at \"{queue}\" queue"),
            CourierLevel::Info,
            QUEUE_CATEGORY,
        );
        let mut delivery = None;
        while delivery.is_none() && control.is_running() {
            delivery = next(poll)?;
        }
        // A delivery already taken from the transport is always handled.
        if let Some(delivery) = delivery {
            handler(delivery);
        }
    }
    Ok(())
}
