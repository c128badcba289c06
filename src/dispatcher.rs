// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Dispatcher
//!
//! Single consumer of the inbound channel. Each message is classified on its
//! own, against the [`RoutingTable`], and handed to the matching
//! [`ThingController`] operation:
//!
//! - the `Authorization` header is required before anything else;
//! - request/reply operations additionally need `correlation_id` and
//!   `reply_to`, checked before the controller is called;
//! - controller errors are propagated unchanged and never retried.
//!
//! Messages are handled one at a time, in the order they come out of the
//! inbound channel. A controller call that never returns stalls the loop.

use crate::{
    controller::ThingController,
    errors::{AmqpError, DispatchError},
    message::{CorrelationContext, InboundMessage},
    otel,
    routing::{Operation, RoutingTable},
    subscriber::Subscriber,
    topology::TopologyBinding,
};
use opentelemetry::{
    global,
    trace::{Span, Status},
};
use std::{
    borrow::Cow,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info};

/// Capacity of the channel shared by all forwarders of one handler.
pub const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// Routes inbound messages to the controller.
pub struct Dispatcher<C: ThingController> {
    controller: Arc<C>,
    table: RoutingTable,
}

impl<C: ThingController> Dispatcher<C> {
    pub fn new(controller: Arc<C>, table: RoutingTable) -> Self {
        Dispatcher { controller, table }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Validates `msg`, resolves its operation and calls the controller once.
    pub async fn dispatch(&self, msg: &InboundMessage) -> Result<(), DispatchError> {
        let token = msg.authorization()?;
        let op = self.table.resolve(&msg.exchange, &msg.routing_key)?;
        let body = msg.body.as_slice();

        debug!(operation = ?op, family = ?op.family(), "dispatching message");

        match op {
            Operation::Register => self.controller.register(body, token).await?,
            Operation::Unregister => self.controller.unregister(body, token).await?,
            Operation::UpdateSchema => self.controller.update_schema(body, token).await?,
            Operation::RequestData => self.controller.request_data(body, token).await?,
            Operation::UpdateData => self.controller.update_data(body, token).await?,
            Operation::PublishData => self.controller.publish_data(body, token).await?,
            Operation::AuthDevice => {
                let ctx = CorrelationContext::from_headers(&msg.headers)?;
                self.controller
                    .auth_device(body, token, &ctx.reply_to, &ctx.correlation_id)
                    .await?
            }
            Operation::ListDevices => {
                let ctx = CorrelationContext::from_headers(&msg.headers)?;
                self.controller
                    .list_devices(token, &ctx.reply_to, &ctx.correlation_id)
                    .await?
            }
        }

        Ok(())
    }

    /// Dispatches `msg` inside a consumer span, logging any failure.
    async fn handle(&self, msg: InboundMessage) {
        info!(
            exchange = msg.exchange,
            routing_key = msg.routing_key,
            "message received"
        );
        debug!(body = %String::from_utf8_lossy(&msg.body), "message body");

        let tracer = global::tracer("amqp dispatcher");
        let (_ctx, mut span) = otel::new_span(&msg.headers.trace, &tracer, &msg.routing_key);

        match self.dispatch(&msg).await {
            Ok(()) => span.set_status(Status::Ok),
            Err(err) => {
                error!(
                    error = err.to_string(),
                    exchange = msg.exchange,
                    routing_key = msg.routing_key,
                    "failure to dispatch message"
                );
                span.record_error(&err);
                span.set_status(Status::Error {
                    description: Cow::from(err.to_string()),
                });
            }
        }
    }

    /// Drains `inbound` until every sender is gone.
    pub async fn consume(&self, mut inbound: mpsc::Receiver<InboundMessage>) {
        while let Some(msg) = inbound.recv().await {
            self.handle(msg).await;
        }

        debug!("inbound channel closed");
    }
}

/// Subscribes to every route of the dispatcher and runs its consume loop.
///
/// `start` can be called again after a reconnect: it replaces the previous
/// loop, so there is at most one loop per handler.
pub struct MessageHandler<C: ThingController + 'static> {
    subscriber: Arc<dyn Subscriber>,
    dispatcher: Arc<Dispatcher<C>>,
    bindings: Vec<TopologyBinding>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: ThingController + 'static> MessageHandler<C> {
    pub fn new(
        subscriber: Arc<dyn Subscriber>,
        dispatcher: Dispatcher<C>,
        commands_queue: &str,
        events_queue: &str,
    ) -> Self {
        let bindings = dispatcher.table().bindings(commands_queue, events_queue);

        MessageHandler {
            subscriber,
            dispatcher: Arc::new(dispatcher),
            bindings,
            worker: Mutex::new(None),
        }
    }

    pub fn bindings(&self) -> &[TopologyBinding] {
        &self.bindings
    }

    /// Subscribes to every binding and spawns the consume loop.
    ///
    /// The first subscription failure aborts the start; `started` receives
    /// `false` and the error is returned.
    pub async fn start(&self, started: mpsc::Sender<bool>) -> Result<(), AmqpError> {
        self.stop();

        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        for binding in &self.bindings {
            if let Err(err) = self.subscriber.on_message(tx.clone(), binding).await {
                error!(error = err.to_string(), binding = %binding, "failure to subscribe");
                let _ = started.send(false).await;
                return Err(err);
            }
        }
        drop(tx);

        let dispatcher = self.dispatcher.clone();
        *self.worker() = Some(tokio::spawn(async move { dispatcher.consume(rx).await }));

        debug!("message handler started");
        let _ = started.send(true).await;

        Ok(())
    }

    /// Aborts the consume loop, if any.
    pub fn stop(&self) {
        if let Some(worker) = self.worker().take() {
            worker.abort();
            debug!("message handler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
