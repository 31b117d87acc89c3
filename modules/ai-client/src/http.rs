use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// HTTP client with an optional whole-request timeout.
pub(crate) fn build_http(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder.build().context("Failed to build HTTP client")
}

/// Send a request and decode a JSON body, turning non-2xx replies into errors
/// that carry the provider's own message.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &str,
) -> Result<T> {
    let response = check_status(request, provider).await?;
    response
        .json()
        .await
        .with_context(|| format!("{provider} returned an unreadable response"))
}

/// Send a request and only check that it succeeded.
pub(crate) async fn send_ok(request: RequestBuilder, provider: &str) -> Result<()> {
    check_status(request, provider).await.map(|_| ())
}

async fn check_status(request: RequestBuilder, provider: &str) -> Result<reqwest::Response> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{provider} request failed"))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!(
        "{provider} API error ({status}{}): {}",
        if is_retryable(status) { ", retryable" } else { "" },
        error_message(&body)
    ))
}

/// Rate limits and server-side failures; the caller decides whether to retry.
pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Both providers wrap failures as `{"error": {"message": ...}}`.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_message_is_extracted() {
        let openai = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(openai), "Incorrect API key provided");
        let anthropic = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(error_message(anthropic), "Overloaded");
        assert_eq!(error_message(" upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }
}
