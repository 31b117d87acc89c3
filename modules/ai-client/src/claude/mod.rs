mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::{ChatAgent, Message, MessageRole};

use client::ClaudeClient;
use types::*;

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    temperature: f32,
    max_tokens: u32,
    timeout: Option<Duration>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 4096,
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn client(&self) -> Result<ClaudeClient> {
        ClaudeClient::new(&self.api_key, self.timeout, self.base_url.as_deref())
    }
}

impl std::fmt::Debug for Claude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claude")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Anthropic takes the system prompt out-of-band; every other turn keeps its order.
fn build_request(
    model: &str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
) -> ChatRequest {
    let mut request = ChatRequest::new(model)
        .max_tokens(max_tokens)
        .temperature(temperature);
    let mut system: Vec<String> = Vec::new();

    for message in messages {
        match message.role {
            MessageRole::System => system.push(message.content),
            MessageRole::User => request = request.message(Role::User, message.content),
            MessageRole::Assistant => {
                request = request.message(Role::Assistant, message.content)
            }
        }
    }

    if !system.is_empty() {
        request = request.system(system.join("\n\n"));
    }
    request
}

// =============================================================================
// ChatAgent Implementation
// =============================================================================

#[async_trait]
impl ChatAgent for Claude {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: Vec<Message>) -> Result<String> {
        let request = build_request(&self.model, self.max_tokens, self.temperature, messages);

        let response = self.client()?.chat(&request).await?;

        response
            .text()
            .ok_or_else(|| anyhow!("No response from Claude"))
    }

    async fn ping(&self) -> Result<()> {
        self.client()?.list_models().await
    }
}
