// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel
//!
//! Opens the physical link to RabbitMQ: one connection carrying one channel.
//! The connector also hooks the connection error callback so that the
//! connection manager learns about asynchronous closures.

use crate::{
    connection::{Connector, Established},
    errors::AmqpError,
};
use async_trait::async_trait;
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

const REPLY_SUCCESS: u16 = 200;

/// The live physical link: a connection and its single channel.
pub struct AmqpLink {
    connection: Connection,
    channel: Channel,
}

impl AmqpLink {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }
}

/// Opens a connection to `uri` and creates a channel on it.
pub async fn new_amqp_channel(
    uri: &str,
    connection_name: &str,
) -> Result<(Connection, Channel), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(connection_name.to_owned()));

    let conn = match Connection::connect(uri, options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError)
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((conn, c))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            if let Err(err) = conn.close(REPLY_SUCCESS, "channel creation failed").await {
                warn!(error = err.to_string(), "failure to close half-open connection");
            }
            Err(AmqpError::ChannelError)
        }
    }
}

/// [`Connector`] that dials RabbitMQ with lapin.
pub struct AmqpConnector {
    uri: String,
    connection_name: String,
}

impl AmqpConnector {
    pub fn new(uri: &str, connection_name: &str) -> Self {
        AmqpConnector {
            uri: uri.to_owned(),
            connection_name: connection_name.to_owned(),
        }
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    type Link = AmqpLink;

    async fn connect(&self) -> Result<Established<AmqpLink>, AmqpError> {
        let (connection, channel) = new_amqp_channel(&self.uri, &self.connection_name).await?;

        let (closed_tx, closed_rx) = oneshot::channel();
        let mut closed_tx = Some(closed_tx);
        connection.on_error(move |err| {
            if let Some(tx) = closed_tx.take() {
                let _ = tx.send(err.to_string());
            }
        });

        Ok(Established {
            link: Arc::new(AmqpLink {
                connection,
                channel,
            }),
            closed: closed_rx,
        })
    }

    async fn close(&self, link: &AmqpLink) {
        if link.channel.status().connected() {
            if let Err(err) = link.channel.close(REPLY_SUCCESS, "OK").await {
                warn!(error = err.to_string(), "failure to close the channel");
            }
        }

        if link.is_connected() {
            if let Err(err) = link.connection.close(REPLY_SUCCESS, "OK").await {
                warn!(error = err.to_string(), "failure to close the connection");
            }
        }
    }
}
