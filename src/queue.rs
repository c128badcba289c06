// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! Queues consumed by the bridge are durable, shared (not exclusive) and kept
//! when the last consumer goes away, so that the broker keeps them across
//! reconnects.

use lapin::options::QueueDeclareOptions;

/// Definition of a queue with its declaration flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDefinition<'qd> {
    pub(crate) name: &'qd str,
}

impl<'qd> QueueDefinition<'qd> {
    /// Creates a durable, non exclusive, non auto-deleted queue definition.
    pub fn new(name: &'qd str) -> QueueDefinition<'qd> {
        QueueDefinition { name }
    }

    pub(crate) fn options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            passive: false,
            durable: true,
            exclusive: false,
            auto_delete: false,
            nowait: false,
        }
    }
}

/// Configuration for binding a queue to an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a binding for the given queue with an empty exchange and key.
    pub fn new(queue: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_name: queue,
            exchange_name: "",
            routing_key: "",
        }
    }

    /// Sets the exchange to bind the queue to.
    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    /// Sets the routing key for the binding.
    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }
}
