// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Command Reply Sender
//!
//! Answers request/reply commands. The reply is published on the devices
//! exchange using the caller's `reply_to` as routing key and carries the
//! caller's `correlation_id` header, which is how the caller's temporary queue
//! matches the answer to its request.

use crate::{
    entities::Thing,
    errors::{AmqpError, ControllerError},
    exchange::ExchangeKind,
    message::{OutboundMessage, CORRELATION_ID_HEADER},
    payloads::{encode, error_message, DeviceAuthResponse, DeviceListResponse},
    publisher::Publisher,
    routing::EXCHANGE_DEVICES,
};
use std::sync::Arc;

/// Sends the replies of request/reply commands.
pub struct CommandSender {
    publisher: Arc<dyn Publisher>,
}

impl CommandSender {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        CommandSender { publisher }
    }

    /// Answers an authentication request.
    ///
    /// # Parameters
    /// * `thing_id` - Thing that asked to authenticate
    /// * `reply_to` - Caller queue, used as routing key
    /// * `correlation_id` - Caller's request identifier, echoed back
    /// * `err` - Controller failure, reported in the `error` field
    ///
    /// # Returns
    /// * `Result<(), AmqpError>` - Ok if the reply was published
    pub async fn send_auth_response(
        &self,
        thing_id: &str,
        reply_to: &str,
        correlation_id: &str,
        err: Option<&ControllerError>,
    ) -> Result<(), AmqpError> {
        let body = encode(&DeviceAuthResponse {
            id: thing_id.to_owned(),
            error: error_message(err),
        })?;

        self.reply(reply_to, correlation_id, body).await
    }

    /// Answers a device listing request with `things`.
    pub async fn send_list_response(
        &self,
        things: &[Thing],
        reply_to: &str,
        correlation_id: &str,
        err: Option<&ControllerError>,
    ) -> Result<(), AmqpError> {
        let body = encode(&DeviceListResponse {
            devices: things.to_vec(),
            error: error_message(err),
        })?;

        self.reply(reply_to, correlation_id, body).await
    }

    async fn reply(
        &self,
        reply_to: &str,
        correlation_id: &str,
        body: Vec<u8>,
    ) -> Result<(), AmqpError> {
        let msg = OutboundMessage::new(EXCHANGE_DEVICES, ExchangeKind::Direct, reply_to, body)
            .header(CORRELATION_ID_HEADER, correlation_id);

        self.publisher.publish_persistent(&msg).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::MockPublisher;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn should_reply_to_caller_with_correlation_id() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish_persistent()
            .withf(|msg| {
                let body: Value = serde_json::from_slice(&msg.body).unwrap();
                msg.exchange == EXCHANGE_DEVICES
                    && msg.routing_key == "amq.gen-reply"
                    && msg.headers.get(CORRELATION_ID_HEADER).map(String::as_str) == Some("c1")
                    && body == json!({"id": "fbe64efa6c7f717e", "error": null})
            })
            .times(1)
            .returning(|_| Ok(()));

        let sender = CommandSender::new(Arc::new(publisher));

        assert_eq!(
            sender
                .send_auth_response("fbe64efa6c7f717e", "amq.gen-reply", "c1", None)
                .await,
            Ok(())
        );
    }

    #[tokio::test]
    async fn should_report_controller_error_in_list_reply() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish_persistent()
            .withf(|msg| {
                let body: DeviceListResponse = serde_json::from_slice(&msg.body).unwrap();
                body.devices.is_empty() && body.error.as_deref() == Some("unauthorized")
            })
            .times(1)
            .returning(|_| Ok(()));

        let sender = CommandSender::new(Arc::new(publisher));
        let err = ControllerError::new("unauthorized");

        assert_eq!(
            sender
                .send_list_response(&[], "r1", "c1", Some(&err))
                .await,
            Ok(())
        );
    }
}
