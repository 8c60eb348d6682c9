//! AMQP adapter over `lapin`.
//!
//! The pipeline is synchronous, so every broker future is driven to
//! completion with `futures::executor::block_on`. Consumed deliveries are
//! forwarded by a consumer delegate into a crossbeam channel; the consume
//! loop waits on it with a timeout so a stop request is seen while idle.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use futures::executor::block_on;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties,
    acker::Acker,
    message::DeliveryResult,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, ShortString},
};
use log::{debug, warn};

use super::{
    Acknowledger, ConsumerControl, Delivery, QueueClient, QueueError, log_published, run_consumer,
};
use crate::config::QueueConfig;
use crate::logger::CourierLogger;
use crate::payload::Payload;

/// Persistent delivery mode.
const DELIVERY_MODE_PERSISTENT: u8 = 2;
/// Header read by the delayed-message exchange plugin.
const DELAY_HEADER: &str = "x-delay";
const CONSUMER_TAG: &str = "courier";

type ConsumedMessage = Result<lapin::message::Delivery, lapin::Error>;

/// [`QueueClient`] backed by one AMQP connection and channel.
pub struct AmqpQueue {
    connection: Connection,
    channel: Channel,
    logger: Arc<CourierLogger>,
    poll_interval: Duration,
}

impl AmqpQueue {
    /// Open a connection and channel to the broker described by `config`.
    pub fn connect(config: &QueueConfig, logger: Arc<CourierLogger>) -> Result<Self, QueueError> {
        let uri = config.uri();
        let connection = block_on(Connection::connect(&uri, ConnectionProperties::default()))
            .map_err(|err| QueueError::Connect(Box::new(err)))?;
        let channel = block_on(connection.create_channel()).map_err(|err| QueueError::Connect(Box::new(err)))?;
        debug!("AmqpQueue connected to {}:{}", config.host, config.port);
        Ok(Self {
            connection,
            channel,
            logger,
            poll_interval: config.poll_interval,
        })
    }

    /// Close the channel and connection.
    pub fn close(&self) -> Result<(), QueueError> {
        block_on(async {
            self.channel.close(200, "OK").await?;
            self.connection.close(200, "OK").await
        })
        .map_err(|err| QueueError::Connect(Box::new(err)))
    }

    fn declare(&self, queue: &str) -> Result<(), QueueError> {
        let options = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        block_on(self.channel.queue_declare(queue, options, FieldTable::default()))
            .map(|_| ())
            .map_err(|err| QueueError::Declare {
                queue: queue.to_owned(),
                source: Box::new(err),
            })
    }

    fn subscribe(&self, queue: &str) -> Result<Receiver<ConsumedMessage>, QueueError> {
        let consume_err = |err: lapin::Error| QueueError::Consume {
            queue: queue.to_owned(),
            source: Box::new(err),
        };
        block_on(self.channel.basic_qos(1, BasicQosOptions::default())).map_err(consume_err)?;
        let consumer = block_on(self.channel.basic_consume(
            queue,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        ))
        .map_err(consume_err)?;

        let (tx, rx) = unbounded();
        consumer.set_delegate(move |delivery: DeliveryResult| {
            let tx = tx.clone();
            async move {
                let message = match delivery {
                    Ok(Some(delivery)) => Ok(delivery),
                    Ok(None) => return,
                    Err(err) => Err(err),
                };
                if tx.send(message).is_err() {
                    debug!("AmqpQueue: consumer loop gone, message left unacknowledged for redelivery");
                }
            }
        });
        Ok(rx)
    }
}

fn publish_properties(delay: Duration) -> BasicProperties {
    let mut properties = BasicProperties::default()
        .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
        .with_content_type(ShortString::from("application/json"));
    if !delay.is_zero() {
        let millis = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from(DELAY_HEADER), AMQPValue::LongLongInt(millis));
        properties = properties.with_headers(headers);
    }
    properties
}

impl QueueClient for AmqpQueue {
    fn publish(&self, queue: &str, payload: &Payload, exchange: &str, delay: Duration) -> Result<(), QueueError> {
        self.declare(queue)?;
        let body = payload.to_json();
        block_on(async {
            self.channel
                .basic_publish(
                    exchange,
                    queue,
                    BasicPublishOptions::default(),
                    body.as_bytes(),
                    publish_properties(delay),
                )
                .await?
                .await
        })
        .map_err(|err| QueueError::Publish {
            queue: queue.to_owned(),
            source: Box::new(err),
        })?;
        log_published(&self.logger, payload, queue);
        Ok(())
    }

    fn consume(
        &self,
        queue: &str,
        handler: &mut dyn FnMut(Delivery),
        control: &ConsumerControl,
    ) -> Result<(), QueueError> {
        self.declare(queue)?;
        let rx = self.subscribe(queue)?;
        run_consumer(
            &self.logger,
            queue,
            control,
            self.poll_interval,
            |wait| match rx.recv_timeout(wait) {
                Ok(Ok(message)) => {
                    let acker = AmqpAcker {
                        acker: message.acker,
                    };
                    Ok(Some(
                        Delivery::new(message.data, Box::new(acker)).redelivered(message.redelivered),
                    ))
                }
                Ok(Err(err)) => Err(QueueError::Consume {
                    queue: queue.to_owned(),
                    source: Box::new(err),
                }),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("AmqpQueue: consumer channel closed for queue {queue}");
                    Err(QueueError::Consume {
                        queue: queue.to_owned(),
                        source: "consumer channel closed".into(),
                    })
                }
            },
            handler,
        )
    }
}

struct AmqpAcker {
    acker: Acker,
}

impl Acknowledger for AmqpAcker {
    fn ack(&mut self) -> Result<(), QueueError> {
        block_on(self.acker.ack(BasicAckOptions::default()))
            .map(|_| ())
            .map_err(|err| QueueError::Resolve(Box::new(err)))
    }

    fn nack(self: Box<Self>, requeue: bool) -> Result<(), QueueError> {
        let options = BasicNackOptions {
            requeue,
            ..BasicNackOptions::default()
        };
        block_on(self.acker.nack(options))
            .map(|_| ())
            .map_err(|err| QueueError::Resolve(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_publish_has_no_delay_header() {
        let properties = publish_properties(Duration::ZERO);
        assert_eq!(properties.delivery_mode(), &Some(DELIVERY_MODE_PERSISTENT));
        assert!(properties.headers().is_none());
    }

    #[test]
    fn delayed_publish_carries_milliseconds() {
        let properties = publish_properties(Duration::from_secs(2));
        let headers = properties.headers().as_ref().expect("headers set");
        assert_eq!(
            headers.inner().get(&ShortString::from(DELAY_HEADER)),
            Some(&AMQPValue::LongLongInt(2000))
        );
    }
}
