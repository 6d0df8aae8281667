//! # ProductivityPal Core
//!
//! Shared vocabulary for every other crate in the workspace:
//! - `error`: the single error enum and `Result` alias
//! - `config`: TOML + environment configuration
//! - `types`: posts, message handles and inbound messages
//! - `bus`: correlation-id reply subscriptions used by channel gateways
//! - `traits`: the `ChannelGateway` and `Responder` contracts

pub mod bus;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use bus::{ReplyBus, ReplySubscription};
pub use config::PalConfig;
pub use error::{PalError, Result};
pub use traits::{ChannelGateway, Responder};
pub use types::{ChannelId, IncomingMessage, MessageHandle, Post, PostField};
