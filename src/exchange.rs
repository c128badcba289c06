// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions
//!
//! Exchanges are the routing entry points of the broker. The bridge only needs
//! durable, non auto-deleted exchanges, but the kind varies: command traffic
//! flows through direct exchanges and broadcast data through fanout ones.

use lapin::options::ExchangeDeclareOptions;
use std::fmt;

/// Represents the types of exchanges available in RabbitMQ.
///
/// - Direct: routes on an exact match of the routing key
/// - Fanout: copies every message to all bound queues, ignoring the key
/// - Topic: routes on wildcard pattern matching of the routing key
/// - Headers: routes on header values instead of the routing key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        }
    }
}

/// Definition of an exchange and the flags it is declared with.
///
/// Every exchange of the bridge is durable and kept when unused; only the kind
/// varies. `new` yields a direct exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeDefinition<'ex> {
    pub(crate) name: &'ex str,
    pub(crate) kind: ExchangeKind,
}

impl<'ex> ExchangeDefinition<'ex> {
    pub fn new(name: &'ex str) -> ExchangeDefinition<'ex> {
        ExchangeDefinition {
            name,
            kind: ExchangeKind::Direct,
        }
    }

    /// Sets the exchange type.
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn options(&self) -> ExchangeDeclareOptions {
        ExchangeDeclareOptions {
            passive: false,
            durable: true,
            auto_delete: false,
            internal: false,
            nowait: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_print_kinds_as_broker_names() {
        assert_eq!(ExchangeKind::Direct.to_string(), "direct");
        assert_eq!(ExchangeKind::Fanout.to_string(), "fanout");
        assert_eq!(ExchangeKind::Topic.to_string(), "topic");
        assert_eq!(ExchangeKind::Headers.to_string(), "headers");
    }

    #[test]
    fn should_declare_durable_exchanges_by_default() {
        let def = ExchangeDefinition::new("device").kind(ExchangeKind::Fanout);
        let opts = def.options();

        assert_eq!(def.kind, ExchangeKind::Fanout);
        assert!(opts.durable);
        assert!(!opts.auto_delete);
        assert!(!opts.internal);
        assert!(!opts.passive);
    }

    #[test]
    fn should_map_to_lapin_kind() {
        let kind: lapin::ExchangeKind = ExchangeKind::Fanout.into();
        assert!(matches!(kind, lapin::ExchangeKind::Fanout));
    }
}
