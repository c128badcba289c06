// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! Publisher capability of the connection manager. Every publish declares its
//! target exchange first, injects the current OpenTelemetry context into the
//! message headers and uses persistent delivery.

use crate::{
    channel::AmqpLink,
    connection::LinkSlot,
    errors::AmqpError,
    message::{OutboundMessage, CORRELATION_ID_HEADER},
    otel,
    topology::{AmqpTopology, Topology},
};
use async_trait::async_trait;
use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties,
};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// AMQP delivery mode for messages that survive a broker restart
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Sends messages to the broker.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Declares `msg.exchange` and publishes `msg` with persistent delivery.
    async fn publish_persistent(&self, msg: &OutboundMessage) -> Result<(), AmqpError>;
}

/// Publisher bound to the current broker link.
///
/// Publishes through one handle are serialized.
pub struct AmqpPublisher {
    slot: Arc<LinkSlot<AmqpLink>>,
    publishing: Mutex<()>,
}

impl AmqpPublisher {
    pub fn new(slot: Arc<LinkSlot<AmqpLink>>) -> Arc<AmqpPublisher> {
        Arc::new(AmqpPublisher {
            slot,
            publishing: Mutex::new(()),
        })
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish_persistent(&self, msg: &OutboundMessage) -> Result<(), AmqpError> {
        let link = self.slot.current().await?;
        let _guard = self.publishing.lock().await;

        if !msg.exchange.is_empty() {
            AmqpTopology::new(link.channel())
                .declare_exchange(&msg.exchange, msg.kind)
                .await?;
        }

        let mut headers = BTreeMap::<ShortString, AMQPValue>::default();
        otel::inject_current(&mut headers);
        for (key, value) in &msg.headers {
            headers.insert(
                ShortString::from(key.clone()),
                AMQPValue::LongString(LongString::from(value.clone())),
            );
        }

        let mut props = BasicProperties::default()
            .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
            .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_headers(FieldTable::from(headers));

        if let Some(correlation_id) = msg.headers.get(CORRELATION_ID_HEADER) {
            props = props.with_correlation_id(ShortString::from(correlation_id.clone()));
        }

        match link
            .channel()
            .basic_publish(
                &msg.exchange,
                &msg.routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &msg.body,
                props,
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange = msg.exchange,
                    routing_key = msg.routing_key,
                    "error publishing message"
                );
                Err(AmqpError::PublishingError)
            }
            _ => {
                debug!(
                    exchange = msg.exchange,
                    routing_key = msg.routing_key,
                    "message published"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeKind;

    #[tokio::test]
    async fn should_fail_when_not_connected() {
        let publisher = AmqpPublisher::new(Arc::new(LinkSlot::default()));
        let msg = OutboundMessage::new("device", ExchangeKind::Direct, "device.registered", vec![]);

        assert_eq!(
            publisher.publish_persistent(&msg).await,
            Err(AmqpError::NotConnected)
        );
    }
}
