//! Contracts the workflows depend on.

pub mod channel;
pub mod responder;

pub use channel::ChannelGateway;
pub use responder::Responder;
