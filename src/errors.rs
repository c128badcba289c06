// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Device Bridge
//!
//! Errors are split by layer. `AmqpError` covers the broker link and its
//! topology, `DispatchError` covers the validation of a single inbound message,
//! `ControllerError` is the opaque failure reported by the business collaborator
//! and `BridgeError` is what the supervisor surfaces to the process.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Transport faults (see [`AmqpError::is_transient`]) clear once the
/// connection manager reconnects. Topology faults are fatal to the
/// subscription attempt that triggered them.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// No link is currently established with the broker
    #[error("broker link is not connected")]
    NotConnected,

    /// The retry policy gave up before a connection could be established
    #[error("retry policy exhausted")]
    RetryExhausted,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error binding a consumer to a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error encoding or decoding a message payload
    #[error("failure to parse payload")]
    ParsePayloadError,
}

impl AmqpError {
    /// Whether the fault comes from the link going away rather than from the
    /// broker rejecting what was asked of it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AmqpError::ConnectionError
                | AmqpError::ChannelError
                | AmqpError::NotConnected
                | AmqpError::BindingConsumerError(_)
                | AmqpError::PublishingError
        )
    }
}

/// Failure reported by the external controller collaborator.
///
/// The dispatcher never inspects it; the text ends up in the `error` field of
/// response payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ControllerError(pub String);

impl ControllerError {
    pub fn new(msg: impl Into<String>) -> Self {
        ControllerError(msg.into())
    }
}

/// Faults raised while classifying and routing one inbound message.
///
/// All of them are local to the message: the dispatcher logs them, drops the
/// message and moves on to the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("missing authorization header")]
    MissingAuthorization,

    #[error("unsupported exchange `{0}`")]
    UnsupportedExchange(String),

    #[error("unexpected routing key `{0}`")]
    UnexpectedRoutingKey(String),

    #[error("missing correlation id")]
    MissingCorrelationID,

    #[error("missing reply to")]
    MissingReplyTo,

    /// Error returned by the controller, propagated unchanged
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Errors surfaced by the bridge supervisor.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BridgeError {
    /// The broker rejected the topology of a subscription.
    #[error("message handler failed to start")]
    HandlerStartFailed,

    #[error("connection manager gave up reconnecting")]
    ConnectionGaveUp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_tell_link_faults_from_topology_faults() {
        assert!(AmqpError::NotConnected.is_transient());
        assert!(AmqpError::ChannelError.is_transient());
        assert!(AmqpError::BindingConsumerError("commands".to_owned()).is_transient());

        assert!(!AmqpError::DeclareExchangeError("device".to_owned()).is_transient());
        assert!(!AmqpError::DeclareQueueError("commands".to_owned()).is_transient());
        assert!(
            !AmqpError::BindingExchangeToQueueError("device".to_owned(), "commands".to_owned())
                .is_transient()
        );
    }
}
