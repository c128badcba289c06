// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Routing Table
//!
//! Maps (exchange, routing key) pairs to the controller operation that handles
//! them. The table is built once and resolves with a fixed precedence:
//!
//! 1. the exchange must be known, otherwise `UnsupportedExchange`;
//! 2. request/reply keys win on any known exchange;
//! 3. broadcast exchanges route every key to their single operation;
//! 4. other keys must match a direct command of the exchange, otherwise
//!    `UnexpectedRoutingKey`.
//!
//! The subscription list is derived from the same table so that what the
//! bridge binds and what it dispatches cannot drift apart.

use crate::{errors::DispatchError, exchange::ExchangeKind, topology::TopologyBinding};
use std::collections::BTreeMap;

pub const EXCHANGE_DEVICES: &str = "device";
pub const EXCHANGE_DATA_SENT: &str = "data.sent";
pub const EXCHANGE_DATA_PUBLISHED: &str = "data.published";

pub const BINDING_KEY_REGISTER_DEVICE: &str = "device.register";
pub const BINDING_KEY_UNREGISTER_DEVICE: &str = "device.unregister";
pub const BINDING_KEY_SCHEMA_SENT: &str = "device.schema.sent";
pub const BINDING_KEY_REQUEST_DATA: &str = "data.request";
pub const BINDING_KEY_UPDATE_DATA: &str = "data.update";
pub const BINDING_KEY_AUTH_DEVICE: &str = "device.auth";
pub const BINDING_KEY_LIST_DEVICES: &str = "device.list";

/// How an operation is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Fire-and-forget command.
    Direct,
    /// Command answered on the caller's reply destination.
    RequestReply,
    /// Broadcast data, routing key ignored.
    Event,
}

/// A controller operation reachable from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Unregister,
    UpdateSchema,
    RequestData,
    UpdateData,
    AuthDevice,
    ListDevices,
    PublishData,
}

impl Operation {
    pub fn family(&self) -> Family {
        match self {
            Operation::AuthDevice | Operation::ListDevices => Family::RequestReply,
            Operation::PublishData => Family::Event,
            _ => Family::Direct,
        }
    }
}

#[derive(Debug, Clone)]
struct ExchangeRoutes {
    kind: ExchangeKind,
    keys: BTreeMap<String, Operation>,
    broadcast: Option<Operation>,
}

impl ExchangeRoutes {
    fn new(kind: ExchangeKind) -> Self {
        ExchangeRoutes {
            kind,
            keys: BTreeMap::default(),
            broadcast: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    exchanges: BTreeMap<String, ExchangeRoutes>,
    request_reply: BTreeMap<String, Operation>,
}

impl RoutingTable {
    pub fn new() -> Self {
        RoutingTable::default()
    }

    /// The device command and data surface served by the bridge.
    pub fn device_surface() -> Self {
        RoutingTable::new()
            .direct(EXCHANGE_DEVICES, BINDING_KEY_REGISTER_DEVICE, Operation::Register)
            .direct(EXCHANGE_DEVICES, BINDING_KEY_UNREGISTER_DEVICE, Operation::Unregister)
            .direct(EXCHANGE_DEVICES, BINDING_KEY_SCHEMA_SENT, Operation::UpdateSchema)
            .direct(EXCHANGE_DEVICES, BINDING_KEY_REQUEST_DATA, Operation::RequestData)
            .direct(EXCHANGE_DEVICES, BINDING_KEY_UPDATE_DATA, Operation::UpdateData)
            .request_reply(EXCHANGE_DEVICES, BINDING_KEY_AUTH_DEVICE, Operation::AuthDevice)
            .request_reply(EXCHANGE_DEVICES, BINDING_KEY_LIST_DEVICES, Operation::ListDevices)
            .broadcast(EXCHANGE_DATA_SENT, Operation::PublishData)
    }

    /// Routes `key` on the direct exchange `exchange` to `op`.
    pub fn direct(mut self, exchange: &str, key: &str, op: Operation) -> Self {
        self.routes(exchange, ExchangeKind::Direct)
            .keys
            .insert(key.to_owned(), op);
        self
    }

    /// Routes the request/reply `key` to `op`, bound on the direct exchange `exchange`.
    pub fn request_reply(mut self, exchange: &str, key: &str, op: Operation) -> Self {
        self.routes(exchange, ExchangeKind::Direct)
            .keys
            .insert(key.to_owned(), op);
        self.request_reply.insert(key.to_owned(), op);
        self
    }

    /// Routes everything arriving on the fanout exchange `exchange` to `op`.
    pub fn broadcast(mut self, exchange: &str, op: Operation) -> Self {
        self.routes(exchange, ExchangeKind::Fanout).broadcast = Some(op);
        self
    }

    fn routes(&mut self, exchange: &str, kind: ExchangeKind) -> &mut ExchangeRoutes {
        self.exchanges
            .entry(exchange.to_owned())
            .or_insert_with(|| ExchangeRoutes::new(kind))
    }

    pub fn resolve(&self, exchange: &str, key: &str) -> Result<Operation, DispatchError> {
        let routes = self
            .exchanges
            .get(exchange)
            .ok_or_else(|| DispatchError::UnsupportedExchange(exchange.to_owned()))?;

        if let Some(op) = self.request_reply.get(key) {
            return Ok(*op);
        }

        if let Some(op) = routes.broadcast {
            return Ok(op);
        }

        routes
            .keys
            .get(key)
            .copied()
            .ok_or_else(|| DispatchError::UnexpectedRoutingKey(key.to_owned()))
    }

    /// Subscriptions needed to receive everything the table routes.
    ///
    /// Keyed routes go to `commands_queue`, broadcast exchanges to
    /// `events_queue` with an empty binding key.
    pub fn bindings(&self, commands_queue: &str, events_queue: &str) -> Vec<TopologyBinding> {
        let mut bindings = vec![];

        for (exchange, routes) in &self.exchanges {
            for key in routes.keys.keys() {
                bindings.push(TopologyBinding::new(commands_queue, exchange, routes.kind, key));
            }

            if routes.broadcast.is_some() {
                bindings.push(TopologyBinding::new(events_queue, exchange, routes.kind, ""));
            }
        }

        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_resolve_every_route_of_the_surface() {
        let table = RoutingTable::device_surface();

        let cases = [
            (EXCHANGE_DEVICES, BINDING_KEY_REGISTER_DEVICE, Operation::Register),
            (EXCHANGE_DEVICES, BINDING_KEY_UNREGISTER_DEVICE, Operation::Unregister),
            (EXCHANGE_DEVICES, BINDING_KEY_SCHEMA_SENT, Operation::UpdateSchema),
            (EXCHANGE_DEVICES, BINDING_KEY_REQUEST_DATA, Operation::RequestData),
            (EXCHANGE_DEVICES, BINDING_KEY_UPDATE_DATA, Operation::UpdateData),
            (EXCHANGE_DEVICES, BINDING_KEY_AUTH_DEVICE, Operation::AuthDevice),
            (EXCHANGE_DEVICES, BINDING_KEY_LIST_DEVICES, Operation::ListDevices),
            (EXCHANGE_DATA_SENT, "anything", Operation::PublishData),
            (EXCHANGE_DATA_SENT, "", Operation::PublishData),
        ];

        for (exchange, key, op) in cases {
            assert_eq!(table.resolve(exchange, key), Ok(op), "{} {}", exchange, key);
        }
    }

    #[test]
    fn should_reject_unknown_exchange() {
        let table = RoutingTable::device_surface();

        assert_eq!(
            table.resolve("unknown", BINDING_KEY_REGISTER_DEVICE),
            Err(DispatchError::UnsupportedExchange("unknown".to_owned()))
        );
        assert_eq!(
            table.resolve(EXCHANGE_DATA_PUBLISHED, ""),
            Err(DispatchError::UnsupportedExchange(EXCHANGE_DATA_PUBLISHED.to_owned()))
        );
    }

    #[test]
    fn should_reject_unexpected_routing_key() {
        let table = RoutingTable::device_surface();

        assert_eq!(
            table.resolve(EXCHANGE_DEVICES, "device.registered"),
            Err(DispatchError::UnexpectedRoutingKey("device.registered".to_owned()))
        );
    }

    #[test]
    fn should_give_request_reply_keys_precedence_over_broadcast() {
        let table = RoutingTable::device_surface();

        assert_eq!(
            table.resolve(EXCHANGE_DATA_SENT, BINDING_KEY_LIST_DEVICES),
            Ok(Operation::ListDevices)
        );
    }

    #[test]
    fn should_classify_families() {
        assert_eq!(Operation::Register.family(), Family::Direct);
        assert_eq!(Operation::AuthDevice.family(), Family::RequestReply);
        assert_eq!(Operation::ListDevices.family(), Family::RequestReply);
        assert_eq!(Operation::PublishData.family(), Family::Event);
    }

    #[test]
    fn should_derive_bindings_from_routes() {
        let bindings = RoutingTable::device_surface().bindings("commands", "events");

        assert_eq!(bindings.len(), 8);
        assert!(bindings.contains(&TopologyBinding::new(
            "events",
            EXCHANGE_DATA_SENT,
            ExchangeKind::Fanout,
            ""
        )));
        assert!(bindings.contains(&TopologyBinding::new(
            "commands",
            EXCHANGE_DEVICES,
            ExchangeKind::Direct,
            BINDING_KEY_AUTH_DEVICE
        )));
        assert!(bindings
            .iter()
            .filter(|b| b.exchange == EXCHANGE_DEVICES)
            .all(|b| b.queue == "commands"));
    }
}
