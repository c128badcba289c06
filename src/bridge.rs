// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Bridge Supervisor
//!
//! Composes the connection manager and the message handler and drives their
//! lifecycles. Every time the connection manager reports a fresh link the
//! handler is restarted, which re-declares the topology and re-subscribes on
//! the new link.
//!
//! A handler start that fails because the link went away is not fatal: the
//! connection manager reports the loss and the next link restarts the handler.
//! A topology the broker rejects stops the bridge.

use crate::{
    channel::AmqpConnector,
    commands::CommandSender,
    config::BridgeConfig,
    connection::{ConnectionManager, Connector},
    controller::ThingController,
    dispatcher::{Dispatcher, MessageHandler},
    errors::BridgeError,
    events::ClientPublisher,
    publisher::Publisher,
    routing::RoutingTable,
};
use std::{future::Future, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub struct Bridge<C: ThingController + 'static, K: Connector = AmqpConnector> {
    connection: ConnectionManager<K>,
    handler: MessageHandler<C>,
    publisher: Arc<dyn Publisher>,
}

impl<C: ThingController + 'static> Bridge<C> {
    /// Wires a RabbitMQ connection manager, the device routing table and
    /// `controller` from `cfg`. Nothing connects before [`Bridge::run`].
    pub fn new(cfg: &BridgeConfig, controller: Arc<C>) -> Self {
        let connection = ConnectionManager::from_config(cfg);
        let publisher = connection.publisher();
        let handler = MessageHandler::new(
            connection.subscriber(),
            Dispatcher::new(controller, RoutingTable::device_surface()),
            &cfg.commands_queue,
            &cfg.events_queue,
        );

        Bridge::from_parts(connection, handler, publisher)
    }
}

impl<C: ThingController + 'static, K: Connector> Bridge<C, K> {
    /// Assembles a bridge from already built parts. `publisher` backs both
    /// [`Bridge::client_publisher`] and [`Bridge::command_sender`].
    pub fn from_parts(
        connection: ConnectionManager<K>,
        handler: MessageHandler<C>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Bridge {
            connection,
            handler,
            publisher,
        }
    }

    /// Event publisher for the controller side.
    ///
    /// Shares the bridge's single publisher, so its publishes are serialized
    /// with those of [`Bridge::command_sender`].
    pub fn client_publisher(&self) -> ClientPublisher {
        ClientPublisher::new(self.publisher.clone())
    }

    /// Request/reply answer sender for the controller side.
    pub fn command_sender(&self) -> CommandSender {
        CommandSender::new(self.publisher.clone())
    }

    /// Runs until `shutdown` resolves or a fatal error occurs, then stops the
    /// handler and closes the connection.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ConnectionGaveUp`] once the retry policy is exhausted
    /// - [`BridgeError::HandlerStartFailed`] when the broker rejects the topology
    pub async fn run<F>(&self, shutdown: F) -> Result<(), BridgeError>
    where
        F: Future<Output = ()>,
    {
        info!("starting device bridge");

        let (amqp_tx, mut amqp_rx) = mpsc::channel(1);
        let (handler_tx, mut handler_rx) = mpsc::channel(1);
        self.connection.start(amqp_tx);

        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break Ok(());
                }
                Some(started) = handler_rx.recv() => {
                    if started {
                        info!("message handler started");
                    } else {
                        debug!("message handler did not start");
                    }
                }
                Some(started) = amqp_rx.recv() => {
                    if !started {
                        warn!("AMQP connection lost");
                        self.handler.stop();
                        if self.connection.has_given_up() {
                            break Err(BridgeError::ConnectionGaveUp);
                        }
                        continue;
                    }

                    info!("AMQP connection started");
                    match self.handler.start(handler_tx.clone()).await {
                        Ok(()) => {}
                        Err(err) if err.is_transient() => {
                            warn!(
                                error = err.to_string(),
                                "link lost while starting the message handler"
                            );
                        }
                        Err(err) => {
                            error!(error = err.to_string(), "failure to start message handler");
                            break Err(BridgeError::HandlerStartFailed);
                        }
                    }
                }
            }
        };

        self.handler.stop();
        self.connection.stop().await;

        result
    }
}
