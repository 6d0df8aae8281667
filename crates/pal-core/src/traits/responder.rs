//! Responder trait: prompt in, generated text out.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Responder: Send + Sync {
    /// Provider name for logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate a response for `prompt`.
    ///
    /// Any upstream failure is reported as `PalError::Service`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
