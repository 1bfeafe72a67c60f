use super::{
    Completion, CompletionRequest, EditBackend, ModelInfo, Usage, classify_status,
    classify_transport, endpoint, http_client, parse_retry_after,
};
use crate::catalog;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const BACKEND: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicBackend {
    /// Creates a client for `base_url` authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<String> {
        let response = request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .map_err(|e| classify_transport(BACKEND, &e))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response
            .text()
            .map_err(|e| classify_transport(BACKEND, &e))?;

        if !status.is_success() {
            return Err(classify_status(
                BACKEND,
                status.as_u16(),
                retry_after,
                error_message(&body),
            ));
        }

        Ok(body)
    }
}

impl EditBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let body = self.send(self.client.get(endpoint(&self.base_url, "/v1/models")))?;
        let parsed: ModelsResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(BACKEND, format!("model list: {e}")))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|entry| {
                let description = catalog::remote_profile(&entry.id)
                    .map(|p| p.description.to_string())
                    .or(entry.display_name);
                ModelInfo {
                    id: entry.id,
                    description,
                    size_bytes: None,
                }
            })
            .collect())
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let payload = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!("Sending request to {} ({} max tokens)", BACKEND, request.max_tokens);
        let body = self.send(
            self.client
                .post(endpoint(&self.base_url, "/v1/messages"))
                .json(&payload),
        )?;

        parse_completion(&body)
    }
}

fn parse_completion(body: &str) -> Result<Completion> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| Error::malformed(BACKEND, e.to_string()))?;

    let text: String = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if text.trim().is_empty() {
        return Err(Error::malformed(BACKEND, "response contained no text"));
    }

    let usage = parsed
        .usage
        .map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        })
        .unwrap_or_default();

    Ok(Completion { text, usage })
}

/// Extracts the human-readable message from an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "content": [
                {"type": "text", "text": "Edited paragraph."}
            ],
            "usage": {"input_tokens": 120, "output_tokens": 40}
        }"#;

        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.text, "Edited paragraph.");
        assert_eq!(completion.usage.input_tokens, 120);
        assert_eq!(completion.usage.output_tokens, 40);
    }

    #[test]
    fn test_parse_completion_without_text_is_malformed() {
        let body = r#"{"content": [], "usage": {"input_tokens": 1, "output_tokens": 0}}"#;
        let err = parse_completion(body).unwrap_err();
        assert!(matches!(err, Error::BackendMalformedResponse { .. }));

        let err = parse_completion("<html>gateway</html>").unwrap_err();
        assert!(matches!(err, Error::BackendMalformedResponse { .. }));
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(error_message(body), "invalid x-api-key");
        assert_eq!(error_message("  upstream timeout "), "upstream timeout");
    }

    #[test]
    fn test_request_serialization() {
        let payload = MessagesRequest {
            model: "claude-3-haiku-20240307",
            max_tokens: 4000,
            temperature: 0.85,
            messages: [Message {
                role: "user",
                content: "Edit this.",
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["model"], "claude-3-haiku-20240307");
        assert_eq!(json["max_tokens"], 4000);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Edit this.");
    }
}
