//! HTTP transport for provider chat-completion calls
//!
//! Builds one provider-specific request per call (body shape and auth header
//! vary by wire format) and maps every transport-level problem to a typed
//! `CallFailure`. Timeouts are owned by the dispatcher, not this client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::dispatch::ChatTransport;
use super::providers::{ApiFormat, AuthHeader, ResolvedProvider};
use super::retry::parse_retry_after;
use crate::constants;
use crate::error::CallFailure;

/// API version header for Anthropic
const API_VERSION: &str = "2023-06-01";

/// Shared HTTP client for all provider calls
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent("chorus/0.1")
            .connect_timeout(constants::http::CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build HTTP client: {}. Using default client.", e);
                Client::new()
            });
        Self { http }
    }

    /// Endpoint URL for a call; Google carries the model id in the path
    fn endpoint(provider: &ResolvedProvider, model: &str) -> String {
        provider.base_url.replace("{model}", model)
    }

    /// Build a request with the provider's authentication headers
    fn build_request(&self, provider: &ResolvedProvider, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.post(url);

        match provider.spec.auth_header {
            AuthHeader::Bearer => {
                request = request.header("authorization", format!("Bearer {}", provider.api_key));
            }
            AuthHeader::XApiKey => {
                request = request.header("x-api-key", &provider.api_key);
            }
            AuthHeader::XGoogApiKey => {
                request = request.header("x-goog-api-key", &provider.api_key);
            }
        }

        if provider.spec.api_format == ApiFormat::Anthropic {
            request = request.header("anthropic-version", API_VERSION);
        }

        request.header("content-type", "application/json")
    }

    /// Provider-specific request body for a single-turn prompt
    fn request_body(format: ApiFormat, model: &str, prompt: &str) -> Value {
        match format {
            ApiFormat::OpenAi => json!({
                "model": model,
                "max_tokens": constants::ai::MAX_OUTPUT_TOKENS,
                "temperature": constants::ai::TEMPERATURE,
                "messages": [{
                    "role": "user",
                    "content": prompt
                }]
            }),
            ApiFormat::Anthropic => json!({
                "model": model,
                "max_tokens": constants::ai::MAX_OUTPUT_TOKENS,
                "messages": [{
                    "role": "user",
                    "content": prompt
                }]
            }),
            ApiFormat::Google => json!({
                "contents": [{
                    "role": "user",
                    "parts": [{"text": prompt}]
                }],
                "generationConfig": {
                    "maxOutputTokens": constants::ai::MAX_OUTPUT_TOKENS,
                    "temperature": constants::ai::TEMPERATURE
                }
            }),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        provider: &ResolvedProvider,
        model: &str,
        prompt: &str,
    ) -> Result<Value, CallFailure> {
        let url = Self::endpoint(provider, model);
        let body = Self::request_body(provider.spec.api_format, model, prompt);

        debug!(provider = %provider.id(), model, "sending chat completion request");

        let response = self
            .build_request(provider, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallFailure::connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            error!(provider = %provider.id(), status = status.as_u16(), "provider call failed");
            return Err(CallFailure::http(status.as_u16(), &text, retry_after));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CallFailure::parse(format!("invalid JSON body: {}", e)))
    }
}
