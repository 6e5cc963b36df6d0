use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{
    ChatCompletion, CompletionRequest, ProviderError, ProviderKind, RawCompletion, send_request,
};

const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Anthropic Messages API, authenticated with `x-api-key` plus a pinned API version.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            http,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl ChatCompletion for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<RawCompletion, ProviderError> {
        let body = MessagesBody {
            model: request.model,
            system: request.system,
            messages: vec![Message {
                role: "user",
                content: request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let builder = self
            .http
            .post(format!("{}{MESSAGES_PATH}", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let raw = send_request(self.kind(), builder).await?;
        parse_response(&raw, request.model)
    }
}

fn parse_response(raw: &str, requested_model: &str) -> Result<RawCompletion, ProviderError> {
    let provider = ProviderKind::Anthropic;
    let response: MessagesResponse = serde_json::from_str(raw)
        .map_err(|err| ProviderError::malformed(provider, err.to_string()))?;

    let text = response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::malformed(provider, "no text blocks in content"));
    }

    // input and output are reported separately
    let tokens_used = response
        .usage
        .map(|usage| usage.input_tokens.saturating_add(usage.output_tokens))
        .unwrap_or(0);

    Ok(RawCompletion {
        text: text.to_string(),
        tokens_used,
        resolved_model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_input_and_output_tokens() {
        let raw = r#"{
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-5-haiku-20241022",
            "content": [
                {"type": "text", "text": "السؤال: ما عاصمة مصر؟"},
                {"type": "text", "text": "أ) القاهرة"}
            ],
            "usage": {"input_tokens": 310, "output_tokens": 190}
        }"#;

        let completion = parse_response(raw, "claude-3-5-haiku-latest").unwrap();
        assert_eq!(completion.tokens_used, 500);
        assert_eq!(completion.text, "السؤال: ما عاصمة مصر؟\nأ) القاهرة");
        assert_eq!(completion.resolved_model, "claude-3-5-haiku-20241022");
    }

    #[test]
    fn content_without_text_is_malformed() {
        let raw = r#"{"content": [{"type": "tool_use"}], "usage": {"input_tokens": 1, "output_tokens": 1}}"#;
        let err = parse_response(raw, "claude").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn sends_version_and_key_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "claude-3-5-haiku-latest",
                "system": "sys",
                "max_tokens": 256,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_body(
                r#"{"model":"claude-3-5-haiku-latest","content":[{"type":"text","text":"ok"}],"usage":{"input_tokens":7,"output_tokens":3}}"#,
            )
            .create_async()
            .await;

        let client =
            AnthropicClient::new(reqwest::Client::new(), "sk-ant-test".into(), server.url());
        let completion = client
            .complete(&CompletionRequest {
                system: "sys",
                prompt: "hi",
                model: "claude-3-5-haiku-latest",
                temperature: 0.2,
                max_tokens: 256,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.tokens_used, 10);
    }

    #[tokio::test]
    async fn missing_error_body_gets_generic_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let client = AnthropicClient::new(reqwest::Client::new(), "k".into(), server.url());
        let err = client
            .complete(&CompletionRequest {
                system: "sys",
                prompt: "hi",
                model: "claude-3-5-haiku-latest",
                temperature: 0.2,
                max_tokens: 256,
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "anthropic returned HTTP 503: HTTP 503"
        );
    }
}
