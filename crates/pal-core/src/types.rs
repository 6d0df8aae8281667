//! Message types shared by gateways and workflows.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat channel identifier. `0` means "not configured".
pub type ChannelId = u64;

/// Reference to a message the bot (or a user) posted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel_id: ChannelId,
    pub message_id: String,
}

impl MessageHandle {
    pub fn new(channel_id: ChannelId, message_id: impl Into<String>) -> Self {
        Self {
            channel_id,
            message_id: message_id.into(),
        }
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: String,
    pub channel_id: ChannelId,
    pub author_id: String,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    /// Id of the message this one replies to, if any.
    pub reply_to: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    /// Handle pointing at this message (for reactions).
    pub fn handle(&self) -> MessageHandle {
        MessageHandle::new(self.channel_id, self.message_id.clone())
    }

    /// True when this message is a human reply to `handle`.
    pub fn answers(&self, handle: &MessageHandle) -> bool {
        !self.author_is_bot
            && self.channel_id == handle.channel_id
            && self.reply_to.as_deref() == Some(handle.message_id.as_str())
    }
}

/// A labelled field inside a structured post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostField {
    pub name: String,
    pub value: String,
}

/// Outbound message. A post without a title is sent as plain text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    pub title: Option<String>,
    pub body: String,
    pub fields: Vec<PostField>,
    pub footer: Option<String>,
    /// Local wall-clock time shown on the post.
    pub timestamp: Option<NaiveDateTime>,
    pub color: Option<u32>,
}

impl Post {
    /// Structured post with a title and body.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Plain text message.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(PostField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn timestamp(mut self, at: NaiveDateTime) -> Self {
        self.timestamp = Some(at);
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Look up a field by name.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn is_plain(&self) -> bool {
        self.title.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(reply_to: Option<&str>, bot: bool) -> IncomingMessage {
        IncomingMessage {
            message_id: "m2".into(),
            channel_id: 7,
            author_id: "u1".into(),
            author_name: "alice".into(),
            author_is_bot: bot,
            content: "hi".into(),
            reply_to: reply_to.map(String::from),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_answers_requires_reference_and_human() {
        let handle = MessageHandle::new(7, "m1");
        assert!(message(Some("m1"), false).answers(&handle));
        assert!(!message(Some("m1"), true).answers(&handle));
        assert!(!message(None, false).answers(&handle));
        assert!(!message(Some("other"), false).answers(&handle));
        assert!(!message(Some("m1"), false).answers(&MessageHandle::new(8, "m1")));
    }

    #[test]
    fn test_post_builder() {
        let post = Post::new("Title", "Body").field("A", "1").footer("foot");
        assert!(!post.is_plain());
        assert_eq!(post.field_value("A"), Some("1"));
        assert_eq!(post.field_value("B"), None);
        assert!(Post::text("hello").is_plain());
    }
}
