//! The Remote Model Client: one-shot request/response against the
//! upstream gateway, a retry wrapper, and a shared keep-alive
//! connection pool.

use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use aggregator_contracts::error::RemoteError;
use aggregator_contracts::model::Message;
use aggregator_resilience::{retry_with_linear_backoff, CircuitBreakerConfig, CircuitBreakerRegistry};

use crate::image::{extract_image, ImageOutput};

/// Sampling parameters for one call. `None` lets the gateway use its
/// own default for that field.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A successful call's payload.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub answer: String,
    pub latency_ms: u64,
}

/// Abstraction over "call an upstream model", so the orchestrator,
/// debate engine, and judge can be exercised against a test double
/// without a network round trip. `RemoteModelClient` is the only
/// production implementation.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn call_model(
        &self,
        model_id: &str,
        messages: &[Message],
        timeout: Duration,
        options: CallOptions,
    ) -> Result<CallOutcome, RemoteError>;

    async fn generate_image(&self, model_id: &str, prompt: &str, timeout: Duration) -> Result<ImageOutput, RemoteError>;
}

/// Calls `gateway.call_model` with the retry policy:
/// no retry on `Timeout`, otherwise up to `max_retries` attempts with
/// a `1s * (attempt + 1)` delay, each attempt using the full timeout
/// independently.
pub async fn call_model_with_retry(
    gateway: &dyn ModelGateway,
    model_id: &str,
    messages: &[Message],
    timeout: Duration,
    options: CallOptions,
    max_retries: u32,
) -> Result<CallOutcome, RemoteError> {
    retry_with_linear_backoff(max_retries, |attempt| {
        let options = options.clone();
        async move {
            if attempt > 0 {
                tracing::debug!(model_id, attempt, "retrying model call");
            }
            gateway.call_model(model_id, messages, timeout, options).await
        }
    })
    .await
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        let role = match m.role {
            aggregator_contracts::model::Role::System => "system",
            aggregator_contracts::model::Role::User => "user",
            aggregator_contracts::model::Role::Assistant => "assistant",
        };
        WireMessage { role, content: m.content.clone() }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// HTTP implementation of [`ModelGateway`] against an OpenRouter-style
/// `/chat/completions` endpoint.
pub struct RemoteModelClient {
    client: reqwest::Client,
    base_url: String,
    breakers: CircuitBreakerRegistry,
}

impl RemoteModelClient {
    /// Builds one shared `reqwest::Client` for the process's lifetime.
    /// A bounded per-host idle pool and fixed identifying headers keep
    /// connections alive: every caller reuses the same sockets instead
    /// of paying a new TLS handshake per model call.
    pub fn new(api_key: impl AsRef<str>, base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", api_key.as_ref()))
                .expect("api key must be a valid header value"),
        );
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("aggregation-engine/0.1"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self { client, base_url: base_url.into(), breakers: CircuitBreakerRegistry::new(CircuitBreakerConfig::default()) })
    }

    fn classify_transport_error(err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::NetworkError(err.to_string())
        }
    }

    async fn call_model_uncircuited(
        &self,
        model_id: &str,
        messages: &[Message],
        timeout: Duration,
        options: CallOptions,
    ) -> Result<CallOutcome, RemoteError> {
        let wire_messages: Vec<WireMessage> = messages.iter().map(WireMessage::from).collect();
        let body = ChatRequest {
            model: model_id,
            messages: &wire_messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let started = Instant::now();
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .timeout(timeout);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return Err(Self::classify_transport_error(e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::RemoteError { status: status.as_u16(), body: body_text });
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(v) => v,
            Err(e) => return Err(Self::classify_transport_error(e)),
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(RemoteError::EmptyResponse)?;

        Ok(CallOutcome { answer, latency_ms })
    }
}

#[async_trait]
impl ModelGateway for RemoteModelClient {
    async fn call_model(
        &self,
        model_id: &str,
        messages: &[Message],
        timeout: Duration,
        options: CallOptions,
    ) -> Result<CallOutcome, RemoteError> {
        if !self.breakers.allow(model_id) {
            return Err(RemoteError::CircuitOpen { model_id: model_id.to_string() });
        }

        let result = self.call_model_uncircuited(model_id, messages, timeout, options).await;
        match &result {
            Ok(_) => self.breakers.record_success(model_id),
            Err(RemoteError::CircuitOpen { .. }) => {}
            Err(_) => self.breakers.record_failure(model_id),
        }
        result
    }

    async fn generate_image(&self, model_id: &str, prompt: &str, timeout: Duration) -> Result<ImageOutput, RemoteError> {
        let body = json!({
            "model": model_id,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .timeout(timeout);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return Err(Self::classify_transport_error(e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::RemoteError { status: status.as_u16(), body: body_text });
        }

        let value: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => return Err(Self::classify_transport_error(e)),
        };

        extract_image(&value).ok_or(RemoteError::UnsupportedImageResponseFormat)
    }
}
