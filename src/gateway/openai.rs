use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};

use crate::gateway::error::{internal_error, GatewayError, GatewayErrorKind};
use crate::gateway::types::CompletionRequest;
use crate::pipeline::ports::InferencePort;

/// Chat completions client for any OpenAI-compatible endpoint, which covers
/// both the hosted fine-tuned experts and local inference servers.
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| internal_error(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_env(endpoint: &str, credential_env: &str) -> Result<Self, GatewayError> {
        let api_key = std::env::var(credential_env).ok().filter(|key| !key.is_empty());
        Self::new(endpoint, api_key)
    }
}

#[async_trait]
impl InferencePort for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": request.model,
            "messages": request.messages,
        });

        let mut builder = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {api_key}"));
        }

        let response = builder.send().await.map_err(|err| {
            GatewayError::new(
                GatewayErrorKind::BackendTransient,
                format!("completion request failed: {err}"),
            )
            .with_retryable(true)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &body));
        }

        let payload = response.json::<Value>().await.map_err(|err| {
            GatewayError::new(
                GatewayErrorKind::ProtocolViolation,
                format!("failed to decode completion response: {err}"),
            )
            .with_retryable(false)
        })?;
        extract_content(&payload)
    }
}

fn extract_content(payload: &Value) -> Result<String, GatewayError> {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GatewayError::new(
                GatewayErrorKind::ProtocolViolation,
                "completion response is missing choices[0].message.content",
            )
            .with_retryable(false)
        })
}

pub fn map_http_error(status: u16, body: &str) -> GatewayError {
    let snippet: String = body.chars().take(240).collect();
    match status {
        401 => GatewayError::new(
            GatewayErrorKind::Authentication,
            format!("authentication rejected: {snippet}"),
        )
        .with_http_status(status),
        403 => GatewayError::new(
            GatewayErrorKind::Authorization,
            format!("authorization rejected: {snippet}"),
        )
        .with_http_status(status),
        408 | 429 => GatewayError::new(
            GatewayErrorKind::RateLimited,
            format!("backend throttled the request: {snippet}"),
        )
        .with_retryable(true)
        .with_http_status(status),
        status if (400..500).contains(&status) => GatewayError::new(
            GatewayErrorKind::InvalidRequest,
            format!("backend rejected the request: {snippet}"),
        )
        .with_http_status(status),
        _ => GatewayError::new(
            GatewayErrorKind::BackendTransient,
            format!("backend failed transiently: {snippet}"),
        )
        .with_retryable(true)
        .with_http_status(status),
    }
}
