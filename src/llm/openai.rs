use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{
    ChatCompletion, CompletionRequest, ProviderError, ProviderKind, RawCompletion, send_request,
};

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

/// OpenAI-compatible chat completions, authenticated with a bearer token.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            http,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl ChatCompletion for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<RawCompletion, ProviderError> {
        let body = ChatCompletionBody {
            model: request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let builder = self
            .http
            .post(format!("{}{CHAT_COMPLETIONS_PATH}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let raw = send_request(self.kind(), builder).await?;
        parse_response(&raw, request.model)
    }
}

fn parse_response(raw: &str, requested_model: &str) -> Result<RawCompletion, ProviderError> {
    let provider = ProviderKind::OpenAi;
    let response: ChatCompletionResponse = serde_json::from_str(raw)
        .map_err(|err| ProviderError::malformed(provider, err.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ProviderError::malformed(provider, "no message content in choices"))?;

    Ok(RawCompletion {
        text,
        tokens_used: response.usage.map(|usage| usage.total_tokens).unwrap_or(0),
        resolved_model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}
