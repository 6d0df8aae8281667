//! Google Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use pal_core::config::PalConfig;
use pal_core::error::{PalError, Result};
use pal_core::traits::Responder;
use serde_json::{Value, json};

pub struct GeminiResponder {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiResponder {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_config(config: &PalConfig) -> Self {
        Self::new(
            config.gemini_api_key.clone(),
            config.gemini.endpoint.clone(),
            config.gemini.model.clone(),
            Duration::from_secs(config.gemini.timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &Value) -> Option<String> {
    let parts = body["candidates"].get(0)?["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl Responder for GeminiResponder {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(PalError::Service("Gemini API key missing".into()));
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        let resp = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| PalError::Service(format!("Gemini request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PalError::Service(format!("Gemini API error {status}: {text}")));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| PalError::Service(format!("Invalid Gemini response: {e}")))?;
        let text = extract_text(&json)
            .ok_or_else(|| PalError::Service("No text in Gemini response".into()))?;
        tracing::debug!("🧠 Gemini replied with {} chars", text.len());
        Ok(text)
    }
}
