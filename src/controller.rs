// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Business collaborator invoked by the dispatcher. Implementations decode the
//! body, call the thing services and answer through
//! [`ClientPublisher`](crate::events::ClientPublisher) or
//! [`CommandSender`](crate::commands::CommandSender).

use crate::errors::ControllerError;
use async_trait::async_trait;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ThingController: Send + Sync {
    async fn register(&self, body: &[u8], token: &str) -> Result<(), ControllerError>;

    async fn unregister(&self, body: &[u8], token: &str) -> Result<(), ControllerError>;

    async fn update_schema(&self, body: &[u8], token: &str) -> Result<(), ControllerError>;

    async fn request_data(&self, body: &[u8], token: &str) -> Result<(), ControllerError>;

    async fn update_data(&self, body: &[u8], token: &str) -> Result<(), ControllerError>;

    async fn auth_device(
        &self,
        body: &[u8],
        token: &str,
        reply_to: &str,
        correlation_id: &str,
    ) -> Result<(), ControllerError>;

    async fn list_devices(
        &self,
        token: &str,
        reply_to: &str,
        correlation_id: &str,
    ) -> Result<(), ControllerError>;

    async fn publish_data(&self, body: &[u8], token: &str) -> Result<(), ControllerError>;
}
