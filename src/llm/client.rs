use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::anthropic::AnthropicClient;
use super::openai::OpenAiClient;

/// Supported chat-completion vendors. Adding a vendor means adding a variant
/// here and an adapter implementing [`ChatCompletion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(name = "openai")]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Everything an adapter needs for one call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub model: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Vendor-neutral result of a successful call. Never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCompletion {
    pub text: String,
    pub tokens_used: u32,
    pub resolved_model: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}: {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {provider}: {detail}")]
    MalformedResponse {
        provider: ProviderKind,
        detail: String,
    },
}

impl ProviderError {
    pub(super) fn malformed(provider: ProviderKind, detail: impl Into<String>) -> Self {
        ProviderError::MalformedResponse {
            provider,
            detail: detail.into(),
        }
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete(&self, request: &CompletionRequest<'_>)
    -> Result<RawCompletion, ProviderError>;
}

pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Builds the adapter for `kind`. `base_url` overrides the vendor endpoint host.
pub fn build_client(
    kind: ProviderKind,
    api_key: String,
    base_url: Option<&str>,
    http: reqwest::Client,
) -> Box<dyn ChatCompletion> {
    let base_url = base_url
        .unwrap_or(kind.default_base_url())
        .trim_end_matches('/')
        .to_string();

    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiClient::new(http, api_key, base_url)),
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(http, api_key, base_url)),
    }
}

/// Sends a prepared request and returns the body of a 2xx response. Non-2xx
/// responses become [`ProviderError::Api`] carrying the vendor's message.
pub(super) async fn send_request(
    provider: ProviderKind,
    request: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    let transport = |source| ProviderError::Transport { provider, source };

    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    debug!(%provider, status = status.as_u16(), bytes = body.len(), "provider responded");

    if !status.is_success() {
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            message,
        });
    }

    Ok(body)
}

/// Pulls the human-readable message out of a vendor error body.
/// Both supported vendors nest it as `{"error": {"message": ...}}`.
pub(super) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let message = value
        .pointer("/error/message")
        .or_else(|| value.get("error").filter(|error| error.is_string()))
        .or_else(|| value.get("message"))?
        .as_str()?
        .trim();

    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!(" anthropic ".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert!("gemini".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn extracts_nested_vendor_messages() {
        let openai = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(
            extract_error_message(openai).as_deref(),
            Some("Incorrect API key provided")
        );

        let anthropic = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(extract_error_message(anthropic).as_deref(), Some("Overloaded"));
    }

    #[test]
    fn tolerates_flat_or_missing_messages() {
        assert_eq!(
            extract_error_message(r#"{"error":"quota exhausted"}"#).as_deref(),
            Some("quota exhausted")
        );
        assert_eq!(
            extract_error_message(r#"{"message":"bad gateway"}"#).as_deref(),
            Some("bad gateway")
        );
        assert_eq!(extract_error_message(r#"{"error":{"message":"  "}}"#), None);
        assert_eq!(extract_error_message("<html>502</html>"), None);
    }
}
