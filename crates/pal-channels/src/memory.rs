//! In-process gateway. Records every post and reaction and answers posts
//! with scripted replies, which makes workflows testable without Discord.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pal_core::error::{PalError, Result};
use pal_core::traits::ChannelGateway;
use pal_core::types::{ChannelId, IncomingMessage, MessageHandle, Post};
use pal_core::{ReplyBus, ReplySubscription};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    Correlated,
    Unrelated,
    FromBot,
}

/// One inbound message produced in response to a post.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    content: String,
    delay: Duration,
    kind: ReplyKind,
}

impl ScriptedReply {
    /// A human reply that references the post.
    pub fn reply(content: impl Into<String>) -> Self {
        Self::with_kind(content, ReplyKind::Correlated)
    }

    /// A human message in the same channel that does not reference the post.
    pub fn unrelated(content: impl Into<String>) -> Self {
        Self::with_kind(content, ReplyKind::Unrelated)
    }

    /// A bot-authored reply that references the post.
    pub fn from_bot(content: impl Into<String>) -> Self {
        Self::with_kind(content, ReplyKind::FromBot)
    }

    /// Delay relative to the previous scripted message.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_kind(content: impl Into<String>, kind: ReplyKind) -> Self {
        Self {
            content: content.into(),
            delay: Duration::ZERO,
            kind,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    posts: Vec<(MessageHandle, Post)>,
    reactions: Vec<(MessageHandle, String)>,
    scripts: HashMap<ChannelId, VecDeque<Vec<ScriptedReply>>>,
}

pub struct MemoryGateway {
    bus: ReplyBus,
    channels: HashSet<ChannelId>,
    state: Mutex<MemoryState>,
}

impl MemoryGateway {
    /// Gateway that knows exactly `channels`; anything else is unavailable.
    pub fn new(channels: impl IntoIterator<Item = ChannelId>) -> Self {
        Self {
            bus: ReplyBus::new(),
            channels: channels.into_iter().filter(|&id| id != 0).collect(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue replies for the next post in `channel_id`. Each call scripts
    /// one more post.
    pub fn script_replies(&self, channel_id: ChannelId, replies: Vec<ScriptedReply>) {
        self.state()
            .scripts
            .entry(channel_id)
            .or_default()
            .push_back(replies);
    }

    /// Publish an arbitrary inbound message.
    pub fn inject(&self, message: IncomingMessage) {
        self.bus.publish(message);
    }

    /// Publish a human message, optionally replying to `reply_to`.
    pub fn say(&self, channel_id: ChannelId, content: &str, reply_to: Option<&str>) -> MessageHandle {
        let id = self.next_id();
        self.inject(incoming(channel_id, &id, content, reply_to, false));
        MessageHandle::new(channel_id, id)
    }

    pub fn posts(&self) -> Vec<(MessageHandle, Post)> {
        self.state().posts.clone()
    }

    pub fn posts_in(&self, channel_id: ChannelId) -> Vec<Post> {
        self.state()
            .posts
            .iter()
            .filter(|(h, _)| h.channel_id == channel_id)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn reactions(&self) -> Vec<(MessageHandle, String)> {
        self.state().reactions.clone()
    }

    fn next_id(&self) -> String {
        let mut state = self.state();
        state.next_id += 1;
        format!("m{}", state.next_id)
    }
}

fn incoming(
    channel_id: ChannelId,
    id: &str,
    content: &str,
    reply_to: Option<&str>,
    from_bot: bool,
) -> IncomingMessage {
    IncomingMessage {
        message_id: id.to_string(),
        channel_id,
        author_id: if from_bot { "bot" } else { "user-1" }.to_string(),
        author_name: if from_bot { "pal" } else { "user" }.to_string(),
        author_is_bot: from_bot,
        content: content.to_string(),
        reply_to: reply_to.map(String::from),
        timestamp: Utc::now(),
    }
}

#[async_trait]
impl ChannelGateway for MemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn post(&self, channel_id: ChannelId, post: Post) -> Result<MessageHandle> {
        if !self.channels.contains(&channel_id) {
            return Err(PalError::ChannelUnavailable(channel_id));
        }

        let handle = MessageHandle::new(channel_id, self.next_id());
        let script = {
            let mut state = self.state();
            state.posts.push((handle.clone(), post));
            state
                .scripts
                .get_mut(&channel_id)
                .and_then(VecDeque::pop_front)
        };

        if let Some(script) = script {
            let bus = self.bus.clone();
            let ids: Vec<String> = script.iter().map(|_| self.next_id()).collect();
            let target = handle.message_id.clone();
            tokio::spawn(async move {
                for (reply, id) in script.into_iter().zip(ids) {
                    if !reply.delay.is_zero() {
                        tokio::time::sleep(reply.delay).await;
                    }
                    let reply_to = match reply.kind {
                        ReplyKind::Unrelated => None,
                        ReplyKind::Correlated | ReplyKind::FromBot => Some(target.as_str()),
                    };
                    let from_bot = reply.kind == ReplyKind::FromBot;
                    bus.publish(incoming(channel_id, &id, &reply.content, reply_to, from_bot));
                }
            });
        }
        Ok(handle)
    }

    fn subscribe_replies(&self, handle: &MessageHandle) -> ReplySubscription {
        self.bus.subscribe_replies(handle)
    }

    fn subscribe_all(&self) -> broadcast::Receiver<IncomingMessage> {
        self.bus.subscribe_all()
    }

    async fn react(&self, handle: &MessageHandle, marker: &str) -> Result<()> {
        if !self.channels.contains(&handle.channel_id) {
            return Err(PalError::ChannelUnavailable(handle.channel_id));
        }
        self.state()
            .reactions
            .push((handle.clone(), marker.to_string()));
        Ok(())
    }

    async fn is_reachable(&self, channel_id: ChannelId) -> bool {
        self.channels.contains(&channel_id)
    }
}
