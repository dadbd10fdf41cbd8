// src/backend/http.rs
// Chat-completions backend (the request shape shared by the OpenAI-compatible
// endpoints of Gemini, OpenAI, Anthropic, NVIDIA and OpenRouter)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::debug;

use super::Backend;
use crate::config::{ProviderSettings, is_valid_secret};
use crate::error::BackendError;
use crate::redact;

pub struct ChatCompletionsBackend {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsBackend {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into().trim().to_string(),
            model: model.into(),
        })
    }

    pub fn from_settings(settings: &ProviderSettings, timeout: Duration) -> anyhow::Result<Self> {
        Self::new(
            settings.spec.id,
            settings.spec.base_url,
            settings.api_key.clone(),
            settings.model.clone(),
            timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Map a non-success HTTP answer onto the error taxonomy.
pub fn classify_status(backend: &str, status: StatusCode, body: &str) -> BackendError {
    let message = format!("HTTP {}: {}", status.as_u16(), redact::preview(body, 300));
    let lowered = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("too many requests")
        || lowered.contains("quota")
        || lowered.contains("resource_exhausted")
    {
        BackendError::rate_limited(backend, message)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        BackendError::transient(backend, message)
    } else {
        BackendError::fatal(backend, message)
    }
}

/// Pull the first choice's text out of a chat-completions body.
pub fn extract_content(backend: &str, raw: &Value) -> Result<String, BackendError> {
    let content = &raw["choices"][0]["message"]["content"];
    if let Some(text) = content.as_str() {
        return Ok(text.to_string());
    }
    // Some gateways return content as a list of typed parts
    if let Some(parts) = content.as_array() {
        let text: String = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    Err(BackendError::fatal(backend, "no content in response"))
}

#[async_trait]
impl Backend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        is_valid_secret(&self.api_key)
    }

    async fn invoke(&self, prompt: &str) -> Result<String, BackendError> {
        let start = Instant::now();
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        debug!("{} request: model={}", self.name, self.model);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::transient(&self.name, redact::sanitize(&e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.name, status, &error_text));
        }

        let raw = response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::fatal(&self.name, format!("malformed body: {}", e)))?;

        let content = extract_content(&self.name, &raw)?;
        debug!(
            "{} answered in {}ms ({} chars)",
            self.name,
            start.elapsed().as_millis(),
            content.len()
        );
        Ok(content)
    }
}
