// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Subscriber Capability
//!
//! Declares the topology of a subscription, starts a consumer on its queue and
//! spawns a forwarder feeding the caller's inbound channel. Forwarders end with
//! their delivery stream, which happens when the link goes down.

use crate::{
    channel::AmqpLink,
    connection::LinkSlot,
    consumer,
    errors::AmqpError,
    message::InboundMessage,
    topology::{self, AmqpTopology, TopologyBinding},
};
use async_trait::async_trait;
use lapin::{options::BasicConsumeOptions, types::FieldTable};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

/// Receives messages from the broker.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Declares `binding` and forwards every delivery of its queue onto `out`.
    async fn on_message(
        &self,
        out: mpsc::Sender<InboundMessage>,
        binding: &TopologyBinding,
    ) -> Result<(), AmqpError>;
}

/// Subscriber bound to the current broker link.
pub struct AmqpSubscriber {
    slot: Arc<LinkSlot<AmqpLink>>,
}

impl AmqpSubscriber {
    pub fn new(slot: Arc<LinkSlot<AmqpLink>>) -> Arc<AmqpSubscriber> {
        Arc::new(AmqpSubscriber { slot })
    }
}

#[async_trait]
impl Subscriber for AmqpSubscriber {
    async fn on_message(
        &self,
        out: mpsc::Sender<InboundMessage>,
        binding: &TopologyBinding,
    ) -> Result<(), AmqpError> {
        let link = self.slot.current().await?;

        topology::declare_and_bind(&AmqpTopology::new(link.channel()), binding).await?;

        let consumer_tag = format!("{}-{}", binding.queue, Uuid::new_v4());
        let deliveries = match link
            .channel()
            .basic_consume(
                &binding.queue,
                &consumer_tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: true,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    queue = binding.queue,
                    "failure to create the consumer"
                );
                Err(AmqpError::BindingConsumerError(binding.queue.clone()))
            }
            Ok(c) => Ok(c),
        }?;

        debug!(binding = %binding, consumer_tag, "subscribed");
        tokio::spawn(consumer::forward(deliveries, binding.queue.clone(), out));

        Ok(())
    }
}
