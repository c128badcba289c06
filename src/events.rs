// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Client Event Publisher
//!
//! Publishes the outcome of device commands to fixed routing keys of the
//! devices exchange, and re-broadcasts sent data on the published-data fanout
//! exchange.

use crate::{
    entities::{Data, Schema},
    errors::{AmqpError, ControllerError},
    exchange::ExchangeKind,
    message::{OutboundMessage, AUTHORIZATION_HEADER},
    payloads::{
        encode, error_message, DataRequest, DataSent, DataUpdate, DeviceRegisteredResponse,
        DeviceUnregisteredResponse, SchemaUpdatedResponse,
    },
    publisher::Publisher,
    routing::{EXCHANGE_DATA_PUBLISHED, EXCHANGE_DEVICES},
};
use std::sync::Arc;
use tracing::debug;

pub const ROUTING_KEY_REGISTERED: &str = "device.registered";
pub const ROUTING_KEY_UNREGISTERED: &str = "device.unregistered";
pub const ROUTING_KEY_SCHEMA_UPDATED: &str = "device.schema.updated";

/// Per-device routing key of a data command, `device.<id>.<command>`.
pub fn device_routing_key(thing_id: &str, command: &str) -> String {
    format!("device.{}.{}", thing_id, command)
}

/// Publishes device events on behalf of the controller.
pub struct ClientPublisher {
    publisher: Arc<dyn Publisher>,
}

impl ClientPublisher {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        ClientPublisher { publisher }
    }

    /// Announces the outcome of a registration on `device.registered`.
    ///
    /// # Parameters
    /// * `thing_id` - Identifier of the registered thing
    /// * `name` - Name the thing registered with
    /// * `token` - Credential issued to the thing, empty on failure
    /// * `err` - Controller failure, reported in the `error` field
    ///
    /// # Returns
    /// * `Result<(), AmqpError>` - Ok if the event was published
    pub async fn publish_registered_device(
        &self,
        thing_id: &str,
        name: &str,
        token: &str,
        err: Option<&ControllerError>,
    ) -> Result<(), AmqpError> {
        debug!(thing_id, "sending registered message");
        let body = encode(&DeviceRegisteredResponse {
            id: thing_id.to_owned(),
            name: name.to_owned(),
            token: token.to_owned(),
            error: error_message(err),
        })?;

        self.send_device_event(ROUTING_KEY_REGISTERED, body).await
    }

    /// Announces the outcome of an unregistration on `device.unregistered`.
    pub async fn publish_unregistered_device(
        &self,
        thing_id: &str,
        err: Option<&ControllerError>,
    ) -> Result<(), AmqpError> {
        debug!(thing_id, "sending unregistered message");
        let body = encode(&DeviceUnregisteredResponse {
            id: thing_id.to_owned(),
            error: error_message(err),
        })?;

        self.send_device_event(ROUTING_KEY_UNREGISTERED, body).await
    }

    /// Announces a schema change on `device.schema.updated`.
    pub async fn publish_updated_schema(
        &self,
        thing_id: &str,
        schema: &[Schema],
        err: Option<&ControllerError>,
    ) -> Result<(), AmqpError> {
        let body = encode(&SchemaUpdatedResponse {
            id: thing_id.to_owned(),
            schema: schema.to_vec(),
            error: error_message(err),
        })?;

        self.send_device_event(ROUTING_KEY_SCHEMA_UPDATED, body).await
    }

    /// Asks the thing for fresh readings of `sensor_ids`.
    ///
    /// # Parameters
    /// * `thing_id` - Target thing, part of the `device.<id>.data.request` key
    /// * `sensor_ids` - Sensors to read
    pub async fn publish_request_data(
        &self,
        thing_id: &str,
        sensor_ids: &[i32],
    ) -> Result<(), AmqpError> {
        let body = encode(&DataRequest {
            id: thing_id.to_owned(),
            sensor_ids: sensor_ids.to_vec(),
        })?;

        self.send_device_event(&device_routing_key(thing_id, "data.request"), body)
            .await
    }

    /// Asks the thing to apply `data`, on `device.<id>.data.update`.
    pub async fn publish_update_data(
        &self,
        thing_id: &str,
        data: &[Data],
    ) -> Result<(), AmqpError> {
        let body = encode(&DataUpdate {
            id: thing_id.to_owned(),
            data: data.to_vec(),
        })?;

        self.send_device_event(&device_routing_key(thing_id, "data.update"), body)
            .await
    }

    /// Re-broadcasts data sent by a device, forwarding its credential.
    pub async fn publish_published_data(
        &self,
        thing_id: &str,
        token: &str,
        data: &[Data],
    ) -> Result<(), AmqpError> {
        let body = encode(&DataSent {
            id: thing_id.to_owned(),
            data: data.to_vec(),
        })?;

        let msg = OutboundMessage::new(EXCHANGE_DATA_PUBLISHED, ExchangeKind::Fanout, "", body)
            .header(AUTHORIZATION_HEADER, token);

        self.publisher.publish_persistent(&msg).await
    }

    async fn send_device_event(&self, routing_key: &str, body: Vec<u8>) -> Result<(), AmqpError> {
        let msg = OutboundMessage::new(EXCHANGE_DEVICES, ExchangeKind::Direct, routing_key, body);
        self.publisher.publish_persistent(&msg).await
    }
}
