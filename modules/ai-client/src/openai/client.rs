use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::http::{build_http, send_json};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const PROVIDER: &str = "OpenAI";

/// Also speaks to OpenAI-compatible servers via `base_url`.
pub(crate) struct OpenAiClient {
    http: reqwest::Client,
    headers: HeaderMap,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, timeout: Option<Duration>, base_url: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: build_http(timeout)?,
            headers,
            base_url: base_url
                .unwrap_or(OPENAI_API_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(model = %request.model, messages = request.messages.len(), "OpenAI chat request");
        let url = format!("{}/chat/completions", self.base_url);
        send_json(
            self.http.post(url).headers(self.headers.clone()).json(request),
            PROVIDER,
        )
        .await
    }

    pub async fn list_models(&self) -> Result<ModelList> {
        let url = format!("{}/models", self.base_url);
        send_json(self.http.get(url).headers(self.headers.clone()), PROVIDER).await
    }
}
