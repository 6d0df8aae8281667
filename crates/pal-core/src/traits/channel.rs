//! Channel gateway trait: the chat transport as seen by the workflows.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::bus::ReplySubscription;
use crate::error::Result;
use crate::types::{ChannelId, IncomingMessage, MessageHandle, Post};

#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// Transport name for logs (e.g. "discord").
    fn name(&self) -> &str;

    /// Post a message. Fails with `PalError::ChannelUnavailable` when the
    /// channel cannot be resolved.
    async fn post(&self, channel_id: ChannelId, post: Post) -> Result<MessageHandle>;

    /// Subscribe to human replies referencing `handle`.
    fn subscribe_replies(&self, handle: &MessageHandle) -> ReplySubscription;

    /// Every inbound message, correlated or not.
    fn subscribe_all(&self) -> broadcast::Receiver<IncomingMessage>;

    /// Attach an acknowledgement marker to a message. Best effort.
    async fn react(&self, message: &MessageHandle, marker: &str) -> Result<()>;

    /// Whether the bot can currently see `channel_id`.
    async fn is_reachable(&self, channel_id: ChannelId) -> bool;

    /// Wait for one reply to `handle`, failing with `PalError::TimedOut`.
    async fn await_reply(
        &self,
        handle: &MessageHandle,
        timeout: Duration,
    ) -> Result<IncomingMessage> {
        self.subscribe_replies(handle).next(timeout).await
    }
}
