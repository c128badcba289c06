// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Declaration
//!
//! Before a subscription is activated its exchange and queue must exist and be
//! bound together. Declarations are idempotent on the broker side: declaring an
//! existing exchange or queue with identical flags is a no-op, while conflicting
//! flags make the broker reject the declaration.
//!
//! Every step fails fast, the first error is returned and later steps are not
//! attempted.

use crate::{
    errors::AmqpError,
    exchange::{ExchangeDefinition, ExchangeKind},
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use lapin::{options::QueueBindOptions, types::FieldTable, Channel};
use std::fmt;
use tracing::{debug, error};

/// The (exchange, kind, queue, routing pattern) tuple a subscription needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopologyBinding {
    pub queue: String,
    pub exchange: String,
    pub kind: ExchangeKind,
    pub routing_key: String,
}

impl TopologyBinding {
    pub fn new(queue: &str, exchange: &str, kind: ExchangeKind, routing_key: &str) -> Self {
        TopologyBinding {
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            kind,
            routing_key: routing_key.to_owned(),
        }
    }
}

impl fmt::Display for TopologyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -[{}]-> {}",
            self.exchange, self.kind, self.routing_key, self.queue
        )
    }
}

/// The three declaration steps a subscription goes through.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait Topology: Send + Sync {
    /// Declares a durable exchange of the given kind.
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), AmqpError>;

    /// Declares a durable, shared queue.
    async fn declare_queue(&self, name: &str) -> Result<(), AmqpError>;

    /// Binds `queue` to `exchange` with `routing_key`.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), AmqpError>;
}

/// Declares the exchange, the queue and the binding between them, in this order.
pub async fn declare_and_bind<T>(topology: &T, binding: &TopologyBinding) -> Result<(), AmqpError>
where
    T: Topology + ?Sized,
{
    topology
        .declare_exchange(&binding.exchange, binding.kind)
        .await?;

    topology.declare_queue(&binding.queue).await?;

    topology
        .bind_queue(&binding.queue, &binding.exchange, &binding.routing_key)
        .await
}

/// [`Topology`] over an open lapin channel.
pub struct AmqpTopology<'tp> {
    channel: &'tp Channel,
}

impl<'tp> AmqpTopology<'tp> {
    pub fn new(channel: &'tp Channel) -> AmqpTopology<'tp> {
        AmqpTopology { channel }
    }
}

#[async_trait]
impl Topology for AmqpTopology<'_> {
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), AmqpError> {
        let def = ExchangeDefinition::new(name).kind(kind);
        debug!(exchange = def.name, kind = %def.kind, "declaring exchange");

        self.channel
            .exchange_declare(
                def.name,
                def.kind.into(),
                def.options(),
                FieldTable::default(),
            )
            .await
            .map_err(|err| {
                error!(
                    error = err.to_string(),
                    name = def.name,
                    "error to declare the exchange"
                );
                AmqpError::DeclareExchangeError(def.name.to_owned())
            })
    }

    async fn declare_queue(&self, name: &str) -> Result<(), AmqpError> {
        let def = QueueDefinition::new(name);
        debug!(queue = def.name, "declaring queue");

        match self
            .channel
            .queue_declare(def.name, def.options(), FieldTable::default())
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), queue = def.name, "error to declare the queue");
                Err(AmqpError::DeclareQueueError(def.name.to_owned()))
            }
            _ => Ok(()),
        }
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), AmqpError> {
        let binding = QueueBinding::new(queue)
            .exchange(exchange)
            .routing_key(routing_key);
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            binding.queue_name, binding.exchange_name, binding.routing_key
        );

        match self
            .channel
            .queue_bind(
                binding.queue_name,
                binding.exchange_name,
                binding.routing_key,
                QueueBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(AmqpError::BindingExchangeToQueueError(
                    binding.exchange_name.to_owned(),
                    binding.queue_name.to_owned(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn commands_binding() -> TopologyBinding {
        TopologyBinding::new("commands", "device", ExchangeKind::Direct, "device.register")
    }

    #[test]
    fn should_describe_binding() {
        let binding = TopologyBinding::new("events", "data.sent", ExchangeKind::Fanout, "");

        assert_eq!(binding.to_string(), "data.sent(fanout) -[]-> events");
    }

    #[tokio::test]
    async fn should_declare_exchange_then_queue_then_bind() {
        let mut seq = Sequence::new();
        let mut topology = MockTopology::new();
        topology
            .expect_declare_exchange()
            .withf(|name, kind| name == "device" && *kind == ExchangeKind::Direct)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        topology
            .expect_declare_queue()
            .withf(|name| name == "commands")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        topology
            .expect_bind_queue()
            .withf(|queue, exchange, key| {
                queue == "commands" && exchange == "device" && key == "device.register"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        assert_eq!(declare_and_bind(&topology, &commands_binding()).await, Ok(()));
    }

    #[tokio::test]
    async fn should_stop_at_failed_exchange_declaration() {
        let mut topology = MockTopology::new();
        topology
            .expect_declare_exchange()
            .times(1)
            .returning(|name, _| Err(AmqpError::DeclareExchangeError(name.to_owned())));
        topology.expect_declare_queue().never();
        topology.expect_bind_queue().never();

        assert_eq!(
            declare_and_bind(&topology, &commands_binding()).await,
            Err(AmqpError::DeclareExchangeError("device".to_owned()))
        );
    }

    #[tokio::test]
    async fn should_not_bind_when_queue_declaration_fails() {
        let mut topology = MockTopology::new();
        topology
            .expect_declare_exchange()
            .times(1)
            .returning(|_, _| Ok(()));
        topology
            .expect_declare_queue()
            .times(1)
            .returning(|name| Err(AmqpError::DeclareQueueError(name.to_owned())));
        topology.expect_bind_queue().never();

        assert_eq!(
            declare_and_bind(&topology, &commands_binding()).await,
            Err(AmqpError::DeclareQueueError("commands".to_owned()))
        );
    }
}
