// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Bridges an AMQP broker and an HTTP backend: inbound device commands and
//! events are funneled, dispatched to a [`controller::ThingController`] and
//! answered through the outbound publisher.

mod consumer;
mod otel;

pub mod bridge;
pub mod channel;
pub mod commands;
pub mod config;
pub mod connection;
pub mod controller;
pub mod dispatcher;
pub mod entities;
pub mod errors;
pub mod events;
pub mod exchange;
pub mod logging;
pub mod message;
pub mod payloads;
pub mod publisher;
pub mod queue;
pub mod retry;
pub mod routing;
pub mod subscriber;
pub mod topology;

#[cfg(test)]
pub use controller::MockThingController;
#[cfg(feature = "mocks")]
pub use controller::MockThingController;
#[cfg(test)]
pub use publisher::MockPublisher;
#[cfg(feature = "mocks")]
pub use publisher::MockPublisher;
#[cfg(test)]
pub use subscriber::MockSubscriber;
#[cfg(feature = "mocks")]
pub use subscriber::MockSubscriber;
