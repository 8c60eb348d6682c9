//! The delivery pipeline: consume, deliver, then acknowledge or requeue.
//!
//! Every delivery is resolved exactly once before [`DeliveryHandler::on_message`]
//! returns:
//!
//! * delivered, retry scheduled or retry limit reached: positive ack;
//! * undecodable body: negative ack without requeue, the message is dropped;
//! * failed requeue publish: negative ack with requeue.
//!
//! When the broker refuses a positive ack the delivery is negatively
//! acknowledged without requeue, since the task was already handled.
//!
//! A requeue publishes a copy of the original payload with `iteration`
//! incremented, then acks the original, so the broker never holds two live
//! copies of one attempt.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::iter::successors;
use std::sync::Arc;

use thiserror::Error;

use crate::config::CommandConfig;
use crate::delivery_client::DeliveryClient;
use crate::level::CourierLevel;
use crate::log_entry::DEFAULT_CATEGORY;
use crate::logger::CourierLogger;
use crate::payload::{Payload, PayloadError};
use crate::queue::{ConsumerControl, Delivery, QueueClient, QueueError};

/// Failures that end with a negative acknowledgement.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("unable to decode queue message")]
    Decode(#[from] PayloadError),
    #[error("unable to requeue failed task")]
    Requeue(#[from] QueueError),
}

impl MessageError {
    /// Whether the broker should redeliver the message. Undecodable bodies
    /// never become decodable, so they are dropped.
    pub fn should_requeue(&self) -> bool {
        matches!(self, Self::Requeue(_))
    }
}

/// Decision taken for one delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// Republished with the new retry counter.
    Requeued { iteration: u64 },
    /// Retry counter would exceed the limit; the task was dropped.
    Abandoned { iteration: u64 },
    /// Negatively acknowledged for the broker to redeliver.
    Rejected,
    /// Undecodable; negatively acknowledged without requeue.
    Discarded,
}

pub struct DeliveryHandler<Q, C> {
    queue: Q,
    client: C,
    logger: Arc<CourierLogger>,
    command: CommandConfig,
}

impl<Q: QueueClient, C: DeliveryClient> DeliveryHandler<Q, C> {
    pub fn new(queue: Q, client: C, logger: Arc<CourierLogger>, command: CommandConfig) -> Self {
        Self {
            queue,
            client,
            logger,
            command,
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Consume the configured queue until `control` is stopped.
    pub fn run(&self, control: &ConsumerControl) -> Result<(), QueueError> {
        self.queue.consume(
            &self.command.queue,
            &mut |delivery| {
                self.on_message(delivery);
            },
            control,
        )
    }

    /// Handle one delivery and resolve it.
    pub fn on_message(&self, delivery: Delivery) -> Outcome {
        let body = String::from_utf8_lossy(delivery.body()).into_owned();
        let redelivered = if delivery.is_redelivered() { " (redelivered)" } else { "" };
        self.info(format!("Received queue message data \"{body}\"{redelivered}"));

        match self.process(delivery.body()) {
            Ok(outcome) => {
                if let Err(failure) = delivery.ack() {
                    self.error(format!("Failed to acknowledge queue message: {}", failure.error));
                    self.reject(failure.delivery, false);
                }
                outcome
            }
            Err(err) => {
                self.error(describe_failure(&err, &body));
                let requeue = err.should_requeue();
                self.reject(delivery, requeue);
                if requeue {
                    Outcome::Rejected
                } else {
                    Outcome::Discarded
                }
            }
        }
    }

    fn reject(&self, delivery: Delivery, requeue: bool) {
        if let Err(err) = delivery.nack(requeue) {
            self.error(format!("Failed to reject queue message: {err}"));
        }
    }

    fn process(&self, body: &[u8]) -> Result<Outcome, MessageError> {
        let payload = Payload::decode(body)?;
        if self.client.send(&payload.without_iteration()) {
            self.info("Queue message delivered successfully.");
            return Ok(Outcome::Delivered);
        }

        self.info("Queue message delivering failed. Requeue");
        let iteration = payload.iteration().saturating_add(1);
        if iteration > self.command.retry_limit {
            self.info(format!(
                "Queue message delivering failed, retry limit {} reached, task abandoned",
                self.command.retry_limit
            ));
            return Ok(Outcome::Abandoned { iteration });
        }
        self.queue.publish(
            &self.command.queue,
            &payload.with_iteration(iteration),
            &self.command.exchange,
            self.command.requeue_delay,
        )?;
        Ok(Outcome::Requeued { iteration })
    }

    #[track_caller]
    fn info(&self, text: impl Into<String>) {
        self.logger.log(text, CourierLevel::Info, DEFAULT_CATEGORY);
    }

    #[track_caller]
    fn error(&self, text: impl Into<String>) {
        self.logger.log(text, CourierLevel::Error, DEFAULT_CATEGORY);
    }
}

/// Error text with its source chain, the offending body and, when
/// `RUST_BACKTRACE` enables it, a backtrace.
fn describe_failure(err: &MessageError, body: &str) -> String {
    let mut lines = vec!["Queue message delivery error.".to_owned(), err.to_string()];
    let causes = successors(err.source(), |&cause| cause.source());
    lines.extend(causes.map(|cause| format!("Caused by: {cause}")));
    lines.push(format!("Message body: {body}"));
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.push(backtrace.to_string());
    }
    lines.join("\n")
}
