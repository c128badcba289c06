// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Inbound Funnel
//!
//! Forwards the deliveries of one broker consumer onto the shared inbound
//! channel. Several forwarders may feed the same channel; each one keeps the
//! order of its own stream.

use crate::message::InboundMessage;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Drains `deliveries` into `out` until the stream ends or `out` is closed.
pub(crate) async fn forward<S, T, E>(
    mut deliveries: S,
    queue: String,
    out: mpsc::Sender<InboundMessage>,
) where
    S: Stream<Item = Result<T, E>> + Unpin,
    T: Into<InboundMessage>,
    E: Display,
{
    while let Some(result) = deliveries.next().await {
        match result {
            Ok(delivery) => {
                if out.send(delivery.into()).await.is_err() {
                    debug!(queue, "inbound channel closed, stopping forwarder");
                    return;
                }
            }
            Err(err) => error!(error = err.to_string(), queue, "errors consume msg"),
        }
    }

    debug!(queue, "delivery stream closed");
}
