// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Records
//!
//! Transport-neutral records exchanged between the broker link and the rest of
//! the bridge. Well-known headers are pulled out into typed fields once, when a
//! delivery is converted, so no other layer deals with AMQP field tables.

use crate::{errors::DispatchError, exchange::ExchangeKind};
use lapin::{
    message::Delivery,
    protocol::basic::AMQPProperties,
    types::{AMQPValue, FieldTable},
};
use std::collections::BTreeMap;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CORRELATION_ID_HEADER: &str = "correlation_id";
pub const REPLY_TO_HEADER: &str = "reply_to";

/// Typed view of the headers of an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    pub authorization: Option<String>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    /// Remaining string headers, kept only as trace propagation carriers.
    pub trace: BTreeMap<String, String>,
}

impl MessageHeaders {
    /// Builds the typed headers from an AMQP field table and basic properties.
    ///
    /// Values that are not strings are treated as absent. `correlation_id` and
    /// `reply_to` fall back to the basic properties of the same name.
    pub fn from_amqp(table: Option<&FieldTable>, props: Option<&AMQPProperties>) -> Self {
        let mut headers = MessageHeaders::default();

        if let Some(table) = table {
            for (key, value) in table.inner() {
                let Some(value) = string_value(value) else {
                    continue;
                };

                match key.as_str() {
                    AUTHORIZATION_HEADER => headers.authorization = Some(value),
                    CORRELATION_ID_HEADER => headers.correlation_id = Some(value),
                    REPLY_TO_HEADER => headers.reply_to = Some(value),
                    other => {
                        headers.trace.insert(other.to_owned(), value);
                    }
                }
            }
        }

        if let Some(props) = props {
            if headers.correlation_id.is_none() {
                headers.correlation_id = props
                    .correlation_id()
                    .as_ref()
                    .map(|v| v.as_str().to_owned());
            }
            if headers.reply_to.is_none() {
                headers.reply_to = props.reply_to().as_ref().map(|v| v.as_str().to_owned());
            }
        }

        headers
    }
}

fn string_value(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(v) => std::str::from_utf8(v.as_bytes()).ok().map(str::to_owned),
        AMQPValue::ShortString(v) => Some(v.as_str().to_owned()),
        _ => None,
    }
}

/// A message received from the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub headers: MessageHeaders,
    pub body: Vec<u8>,
}

impl InboundMessage {
    pub fn new(exchange: &str, routing_key: &str, headers: MessageHeaders, body: &[u8]) -> Self {
        InboundMessage {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            headers,
            body: body.to_vec(),
        }
    }

    /// The bearer credential, required on every message.
    pub fn authorization(&self) -> Result<&str, DispatchError> {
        self.headers
            .authorization
            .as_deref()
            .ok_or(DispatchError::MissingAuthorization)
    }
}

impl From<Delivery> for InboundMessage {
    fn from(delivery: Delivery) -> Self {
        let headers = MessageHeaders::from_amqp(
            delivery.properties.headers().as_ref(),
            Some(&delivery.properties),
        );

        InboundMessage {
            exchange: delivery.exchange.as_str().to_owned(),
            routing_key: delivery.routing_key.as_str().to_owned(),
            headers,
            body: delivery.data,
        }
    }
}

/// Correlation data of a request/reply operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    pub correlation_id: String,
    pub reply_to: String,
}

impl CorrelationContext {
    /// Both fields must be present and non-empty.
    pub fn from_headers(headers: &MessageHeaders) -> Result<Self, DispatchError> {
        let correlation_id = headers
            .correlation_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(DispatchError::MissingCorrelationID)?;

        let reply_to = headers
            .reply_to
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(DispatchError::MissingReplyTo)?;

        Ok(CorrelationContext {
            correlation_id: correlation_id.to_owned(),
            reply_to: reply_to.to_owned(),
        })
    }
}

/// A message about to be published. Always sent with persistent delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub kind: ExchangeKind,
    pub routing_key: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl OutboundMessage {
    pub fn new(exchange: &str, kind: ExchangeKind, routing_key: &str, body: Vec<u8>) -> Self {
        OutboundMessage {
            exchange: exchange.to_owned(),
            kind,
            routing_key: routing_key.to_owned(),
            headers: BTreeMap::default(),
            body,
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_owned(), value.to_owned());
        self
    }
}
