//! Discord channel over the REST v10 API.
//!
//! Outbound posts become embeds (or plain `content` for untitled posts).
//! Inbound traffic is picked up by a polling loop over the configured
//! channels and published into the shared [`ReplyBus`]; reply correlation
//! uses Discord's `message_reference`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use pal_core::config::PalConfig;
use pal_core::error::{PalError, Result};
use pal_core::traits::ChannelGateway;
use pal_core::types::{ChannelId, IncomingMessage, MessageHandle, Post};
use pal_core::{ReplyBus, ReplySubscription};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const POLL_BATCH: &str = "50";
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
/// How long an unavailable channel is left alone before it is polled again.
const UNAVAILABLE_BACKOFF: Duration = Duration::from_secs(10 * 60);

/// Discord REST gateway.
pub struct DiscordGateway {
    token: String,
    api_base: String,
    client: reqwest::Client,
    bus: ReplyBus,
}

impl DiscordGateway {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            bus: ReplyBus::new(),
        }
    }

    pub fn from_config(config: &PalConfig) -> Self {
        Self::new(config.discord_token.clone(), config.discord.api_base.clone())
    }

    pub fn bus(&self) -> &ReplyBus {
        &self.bus
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Verify the token and return the bot user.
    pub async fn connect(&self) -> Result<DiscordUser> {
        let response = self
            .request(Method::GET, "/users/@me")
            .send()
            .await
            .map_err(|e| PalError::Channel(format!("Discord users/@me failed: {e}")))?;
        let me: DiscordUser = check(response, None, "users/@me")
            .await?
            .json()
            .await
            .map_err(|e| PalError::Channel(format!("Invalid users/@me response: {e}")))?;
        tracing::info!("🤖 Discord bot: {} ({})", me.username, me.id);
        Ok(me)
    }

    /// Messages in `channel_id`, newest first (Discord's order).
    pub async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        after: Option<&str>,
    ) -> Result<Vec<DiscordMessage>> {
        let mut query = vec![("limit", if after.is_some() { POLL_BATCH } else { "1" })];
        if let Some(after) = after {
            query.push(("after", after));
        }
        let response = self
            .request(Method::GET, &format!("/channels/{channel_id}/messages"))
            .query(&query)
            .send()
            .await
            .map_err(|e| PalError::Channel(format!("Discord fetch messages failed: {e}")))?;
        check(response, Some(channel_id), "fetch messages")
            .await?
            .json()
            .await
            .map_err(|e| PalError::Channel(format!("Invalid messages response: {e}")))
    }

    /// Poll `channels` every `every` and publish new messages to the bus.
    ///
    /// The first poll of a channel only records the newest message id, so
    /// history from before startup is never replayed.
    pub fn start_polling(self: Arc<Self>, channels: Vec<ChannelId>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut cursors: HashMap<ChannelId, Option<String>> = HashMap::new();
            tracing::info!("Discord polling loop started for {} channels", channels.len());

            let mut parked = ChannelBackoff::new(UNAVAILABLE_BACKOFF);

            loop {
                let mut failed = false;
                for &channel_id in &channels {
                    let now = Instant::now();
                    if parked.is_parked(channel_id, now) {
                        continue;
                    }
                    match self.poll_channel(channel_id, &mut cursors).await {
                        Ok(()) => {
                            if parked.clear(channel_id) {
                                tracing::info!("✅ Discord channel {channel_id} is reachable again");
                            }
                        }
                        Err(e @ PalError::ChannelUnavailable(_)) => {
                            if parked.park(channel_id, now) {
                                tracing::warn!(
                                    "⚠️ {e}; pausing polling of channel {channel_id} for {} minutes",
                                    UNAVAILABLE_BACKOFF.as_secs() / 60
                                );
                            } else {
                                tracing::debug!("[discord] channel {channel_id} still unavailable");
                            }
                        }
                        Err(e) => {
                            tracing::warn!("⚠️ Discord polling error on channel {channel_id}: {e}");
                            failed = true;
                        }
                    }
                }
                let pause = if failed { ERROR_BACKOFF.max(every) } else { every };
                tokio::time::sleep(pause).await;
            }
        })
    }

    async fn poll_channel(
        &self,
        channel_id: ChannelId,
        cursors: &mut HashMap<ChannelId, Option<String>>,
    ) -> Result<()> {
        let Some(cursor) = cursors.get(&channel_id) else {
            let newest = self.fetch_messages(channel_id, None).await?;
            cursors.insert(channel_id, newest.first().map(|m| m.id.clone()));
            return Ok(());
        };

        let after = cursor.clone().unwrap_or_else(|| "0".to_string());
        let mut batch = self.fetch_messages(channel_id, Some(&after)).await?;
        batch.reverse();
        if let Some(last) = batch.last() {
            cursors.insert(channel_id, Some(last.id.clone()));
        }
        for message in batch {
            if let Some(incoming) = message.into_incoming() {
                self.bus.publish(incoming);
            }
        }
        Ok(())
    }
}

/// Channels the poller skips until their back-off expires.
struct ChannelBackoff {
    period: Duration,
    until: HashMap<ChannelId, Instant>,
}

impl ChannelBackoff {
    fn new(period: Duration) -> Self {
        Self {
            period,
            until: HashMap::new(),
        }
    }

    fn is_parked(&self, channel_id: ChannelId, now: Instant) -> bool {
        self.until.get(&channel_id).is_some_and(|&until| now < until)
    }

    /// Park `channel_id` for one period. `true` the first time since the
    /// channel was last reachable.
    fn park(&mut self, channel_id: ChannelId, now: Instant) -> bool {
        self.until.insert(channel_id, now + self.period).is_none()
    }

    /// Forget the channel. `true` if it had been parked.
    fn clear(&mut self, channel_id: ChannelId) -> bool {
        self.until.remove(&channel_id).is_some()
    }
}

#[async_trait]
impl ChannelGateway for DiscordGateway {
    fn name(&self) -> &str {
        "discord"
    }

    async fn post(&self, channel_id: ChannelId, post: Post) -> Result<MessageHandle> {
        if channel_id == 0 {
            return Err(PalError::ChannelUnavailable(channel_id));
        }
        let response = self
            .request(Method::POST, &format!("/channels/{channel_id}/messages"))
            .json(&message_payload(&post))
            .send()
            .await
            .map_err(|e| PalError::Channel(format!("Discord post failed: {e}")))?;
        let created: CreatedMessage = check(response, Some(channel_id), "post")
            .await?
            .json()
            .await
            .map_err(|e| PalError::Channel(format!("Invalid post response: {e}")))?;
        Ok(MessageHandle::new(channel_id, created.id))
    }

    fn subscribe_replies(&self, handle: &MessageHandle) -> ReplySubscription {
        self.bus.subscribe_replies(handle)
    }

    fn subscribe_all(&self) -> broadcast::Receiver<IncomingMessage> {
        self.bus.subscribe_all()
    }

    async fn react(&self, handle: &MessageHandle, marker: &str) -> Result<()> {
        let channel = handle.channel_id.to_string();
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| PalError::Channel(format!("Invalid Discord API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| PalError::Channel("Discord API base cannot be a base URL".into()))?
            .pop_if_empty()
            .extend([
                "channels",
                channel.as_str(),
                "messages",
                handle.message_id.as_str(),
                "reactions",
                marker,
                "@me",
            ]);

        let response = self
            .client
            .put(url)
            .header("Authorization", format!("Bot {}", self.token))
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| PalError::Channel(format!("Discord reaction failed: {e}")))?;
        check(response, Some(handle.channel_id), "reaction").await?;
        Ok(())
    }

    async fn is_reachable(&self, channel_id: ChannelId) -> bool {
        if channel_id == 0 {
            return false;
        }
        match self
            .request(Method::GET, &format!("/channels/{channel_id}"))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("⚠️ Discord channel probe {channel_id} failed: {e}");
                false
            }
        }
    }
}

/// Map a non-2xx response to an error. 403/404 on a channel route mean the
/// channel is not usable by this bot.
async fn check(
    response: reqwest::Response,
    channel_id: Option<ChannelId>,
    what: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let Some(id) = channel_id {
        if status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND {
            return Err(PalError::ChannelUnavailable(id));
        }
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!("⚠️ Discord rate limited on {what}");
    }
    let body = response.text().await.unwrap_or_default();
    Err(PalError::Channel(format!("Discord {what} failed ({status}): {body}")))
}

// Discord message and embed limits, counted in characters.
const MAX_CONTENT: usize = 2000;
const MAX_TITLE: usize = 256;
const MAX_DESCRIPTION: usize = 4096;
const MAX_FIELDS: usize = 25;
const MAX_FIELD_NAME: usize = 256;
const MAX_FIELD_VALUE: usize = 1024;
const MAX_FOOTER: usize = 2048;
const MAX_EMBED_TOTAL: usize = 6000;
/// Room kept in the total budget for the "…and N more" field.
const OVERFLOW_RESERVE: usize = 128;
const EMPTY_VALUE: &str = "(empty)";

/// Truncate to `max` characters, marking the cut with `…`.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn non_empty(text: &str) -> &str {
    if text.trim().is_empty() { EMPTY_VALUE } else { text }
}

/// Embed fields within Discord's count and size limits. Fields that do not
/// fit are folded into one trailing "…and N more" field.
fn embed_fields(post: &Post, mut budget: usize) -> Vec<serde_json::Value> {
    let mut fields = Vec::new();
    for (i, field) in post.fields.iter().enumerate() {
        let name = clip(non_empty(&field.name), MAX_FIELD_NAME);
        let value = clip(non_empty(&field.value), MAX_FIELD_VALUE);
        let cost = name.chars().count() + value.chars().count();
        let remaining = post.fields.len() - i;
        let last_slot = i == MAX_FIELDS - 1 && remaining > 1;

        if last_slot || cost + OVERFLOW_RESERVE > budget {
            let rest = &post.fields[i..];
            let name = format!("…and {} more", rest.len());
            let listed: Vec<&str> = rest.iter().map(|f| non_empty(&f.value)).collect();
            let room = budget
                .saturating_sub(name.chars().count())
                .clamp(1, MAX_FIELD_VALUE);
            fields.push(serde_json::json!({
                "name": name,
                "value": clip(&listed.join("\n"), room),
                "inline": false,
            }));
            break;
        }

        budget -= cost;
        fields.push(serde_json::json!({ "name": name, "value": value, "inline": false }));
    }
    fields
}

/// JSON body for `POST /channels/{id}/messages`, clipped to Discord's limits.
fn message_payload(post: &Post) -> serde_json::Value {
    if post.is_plain() {
        return serde_json::json!({ "content": clip(non_empty(&post.body), MAX_CONTENT) });
    }

    let mut embed = serde_json::json!({});
    let mut used = 0;
    if let Some(title) = &post.title {
        let title = clip(title, MAX_TITLE);
        used += title.chars().count();
        embed["title"] = title.into();
    }
    if let Some(footer) = &post.footer {
        let footer = clip(non_empty(footer), MAX_FOOTER);
        used += footer.chars().count();
        embed["footer"] = serde_json::json!({ "text": footer });
    }
    if !post.body.trim().is_empty() {
        let room = MAX_EMBED_TOTAL
            .saturating_sub(used + OVERFLOW_RESERVE)
            .min(MAX_DESCRIPTION);
        let description = clip(&post.body, room);
        used += description.chars().count();
        embed["description"] = description.into();
    }
    embed["fields"] = embed_fields(post, MAX_EMBED_TOTAL.saturating_sub(used)).into();

    if let Some(color) = post.color {
        embed["color"] = color.into();
    }
    if let Some(at) = post.timestamp {
        let rfc3339 = match Local.from_local_datetime(&at).earliest() {
            Some(local) => local.to_rfc3339(),
            None => at.and_utc().to_rfc3339(),
        };
        embed["timestamp"] = rfc3339.into();
    }
    serde_json::json!({ "embeds": [embed] })
}

// --- Discord API Types ---

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageReference {
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    pub author: DiscordUser,
    #[serde(default)]
    pub content: String,
    pub timestamp: Option<String>,
    pub message_reference: Option<MessageReference>,
}

impl DiscordMessage {
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let channel_id = self.channel_id.parse().ok()?;
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        Some(IncomingMessage {
            message_id: self.id,
            channel_id,
            author_id: self.author.id,
            author_name: self.author.username,
            author_is_bot: self.author.bot,
            content: self.content,
            reply_to: self.message_reference.and_then(|r| r.message_id),
            timestamp,
        })
    }
}
