//! Error types for ProductivityPal.
//!
//! Nothing in here is fatal on its own: workflows log and recover from every
//! variant except `Config`, which only surfaces during startup.

use std::time::Duration;

use crate::types::ChannelId;

#[derive(Debug, thiserror::Error)]
pub enum PalError {
    /// The channel id is unconfigured, unknown or not visible to the bot.
    #[error("Channel {0} unavailable")]
    ChannelUnavailable(ChannelId),

    /// Transport-level failure talking to the chat service.
    #[error("Channel error: {0}")]
    Channel(String),

    /// The AI responder failed (transport, quota, malformed body, missing key).
    #[error("Responder service error: {0}")]
    Service(String),

    /// Loading or saving workflow state failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No correlated reply arrived before the deadline.
    #[error("Timed out after {0:?} waiting for a reply")]
    TimedOut(Duration),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PalError {
    /// True for errors that mean "skip this cycle" rather than "something broke".
    pub fn is_skip(&self) -> bool {
        matches!(self, PalError::ChannelUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, PalError>;
