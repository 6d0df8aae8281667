//! # ProductivityPal Channels
//! `ChannelGateway` implementations.
//!
//! - `discord`: Discord REST v10 with a reply-polling loop
//! - `memory`: in-process gateway with scripted replies, for tests and dry runs

pub mod discord;
pub mod memory;

pub use discord::DiscordGateway;
pub use memory::{MemoryGateway, ScriptedReply};
