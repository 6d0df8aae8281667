//! # ProductivityPal Providers
//!
//! AI text generation behind the `Responder` trait. Gemini is the only
//! backend; every caller keeps a fallback string for when it fails.

pub mod gemini;

use std::sync::Arc;

use pal_core::config::PalConfig;
use pal_core::traits::Responder;

pub use gemini::GeminiResponder;

/// Create the responder described by the configuration.
///
/// A missing API key is not an error here: the responder is still built and
/// every call fails with a service error, so workflows use their fallbacks.
pub fn create_responder(config: &PalConfig) -> Arc<dyn Responder> {
    if config.gemini_api_key.trim().is_empty() {
        tracing::warn!("⚠️ No Gemini API key, AI feedback will use fallback text");
    }
    Arc::new(GeminiResponder::from_config(config))
}
