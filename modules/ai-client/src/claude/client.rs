use std::time::Duration;

use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::http::{build_http, send_json, send_ok};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "Claude";

pub(crate) struct ClaudeClient {
    http: reqwest::Client,
    headers: HeaderMap,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str, timeout: Option<Duration>, base_url: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            http: build_http(timeout)?,
            headers,
            base_url: base_url
                .unwrap_or(ANTHROPIC_API_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        debug!(model = %request.model, messages = request.messages.len(), "Claude chat request");
        let url = format!("{}/messages", self.base_url);
        send_json(
            self.http.post(url).headers(self.headers.clone()).json(request),
            PROVIDER,
        )
        .await
    }

    pub async fn list_models(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);
        send_ok(self.http.get(url).headers(self.headers.clone()), PROVIDER).await
    }
}
