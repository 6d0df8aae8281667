//! Conversation collection over a [`ChannelGateway`].
//!
//! Both modes post a prompt and then only listen to replies that reference
//! that prompt. A single exchange waits for one reply; list mode keeps
//! accumulating replies until a terminal keyword or a per-turn timeout.

use std::time::Duration;

use pal_core::error::{PalError, Result};
use pal_core::traits::ChannelGateway;
use pal_core::types::{ChannelId, IncomingMessage, MessageHandle, Post};

/// Replies that end a list collection.
pub const TERMINAL_KEYWORDS: [&str; 4] = ["done", "finished", "complete", "end"];

/// Reaction added to every accepted list item.
pub const ACK_MARKER: &str = "✅";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPhase {
    Idle,
    AwaitingReply,
    Done,
    TimedOut,
}

/// Result of a single exchange.
#[derive(Debug, Clone)]
pub enum Exchange {
    Answered(IncomingMessage),
    TimedOut,
}

/// Result of a list collection. Items survive a timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collected {
    pub items: Vec<String>,
    pub timed_out: bool,
}

pub fn is_terminal(content: &str) -> bool {
    let content = content.trim();
    TERMINAL_KEYWORDS
        .iter()
        .any(|k| content.eq_ignore_ascii_case(k))
}

pub struct ConversationCollector<'a> {
    gateway: &'a dyn ChannelGateway,
    timeout: Duration,
    phase: CollectionPhase,
    prompt: Option<MessageHandle>,
}

impl<'a> ConversationCollector<'a> {
    pub fn new(gateway: &'a dyn ChannelGateway, timeout: Duration) -> Self {
        Self {
            gateway,
            timeout,
            phase: CollectionPhase::Idle,
            prompt: None,
        }
    }

    pub fn phase(&self) -> CollectionPhase {
        self.phase
    }

    /// Handle of the posted prompt, once posted.
    pub fn prompt(&self) -> Option<&MessageHandle> {
        self.prompt.as_ref()
    }

    /// Post `prompt` and wait for one correlated reply.
    ///
    /// Fails only when the prompt cannot be posted.
    pub async fn single(&mut self, channel_id: ChannelId, prompt: Post) -> Result<Exchange> {
        let handle = self.post_prompt(channel_id, prompt).await?;
        let mut replies = self.gateway.subscribe_replies(&handle);

        match replies.next(self.timeout).await {
            Ok(reply) => {
                self.phase = CollectionPhase::Done;
                Ok(Exchange::Answered(reply))
            }
            Err(e) => {
                log_wait_error(channel_id, &e);
                self.phase = CollectionPhase::TimedOut;
                Ok(Exchange::TimedOut)
            }
        }
    }

    /// Post `prompt` and collect replies until a terminal keyword or a
    /// turn with no reply within the timeout.
    pub async fn list(&mut self, channel_id: ChannelId, prompt: Post) -> Result<Collected> {
        let handle = self.post_prompt(channel_id, prompt).await?;
        let mut replies = self.gateway.subscribe_replies(&handle);
        let mut items = Vec::new();

        loop {
            match replies.next(self.timeout).await {
                Ok(reply) if is_terminal(&reply.content) => {
                    self.phase = CollectionPhase::Done;
                    return Ok(Collected {
                        items,
                        timed_out: false,
                    });
                }
                Ok(reply) => {
                    tracing::debug!("[collector] channel {channel_id}: item {}", items.len() + 1);
                    if let Err(e) = self.gateway.react(&reply.handle(), ACK_MARKER).await {
                        tracing::debug!("[collector] reaction on channel {channel_id} failed: {e}");
                    }
                    items.push(reply.content);
                }
                Err(e) => {
                    log_wait_error(channel_id, &e);
                    self.phase = CollectionPhase::TimedOut;
                    return Ok(Collected {
                        items,
                        timed_out: true,
                    });
                }
            }
        }
    }

    async fn post_prompt(&mut self, channel_id: ChannelId, prompt: Post) -> Result<MessageHandle> {
        let handle = self.gateway.post(channel_id, prompt).await?;
        self.prompt = Some(handle.clone());
        self.phase = CollectionPhase::AwaitingReply;
        Ok(handle)
    }
}

fn log_wait_error(channel_id: ChannelId, error: &PalError) {
    match error {
        PalError::TimedOut(after) => {
            tracing::info!("⏰ No reply in channel {channel_id} within {after:?}");
        }
        other => tracing::warn!("⚠️ Reply wait in channel {channel_id} ended: {other}"),
    }
}
