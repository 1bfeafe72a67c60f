use super::{
    Completion, CompletionRequest, EditBackend, ModelInfo, Usage, classify_status, endpoint,
    http_client,
};
use crate::catalog;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const BACKEND: &str = "ollama";

/// Temperatures outside this range make local models ramble or loop.
const MIN_TEMPERATURE: f32 = 0.1;
const MAX_TEMPERATURE: f32 = 0.95;

const CONTEXT_WINDOW: u32 = 16_384;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for a locally running Ollama server.
pub struct OllamaBackend {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl OllamaBackend {
    /// Creates a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<String> {
        let response = request.send().map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        let body = response.text().map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| body.trim().to_string());
            return Err(classify_status(
                BACKEND,
                status.as_u16(),
                None,
                with_pull_hint(message),
            ));
        }

        Ok(body)
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        if err.is_connect() {
            return Error::ServiceNotRunning {
                backend: BACKEND.to_string(),
                url: self.base_url.clone(),
            };
        }
        super::classify_transport(BACKEND, err)
    }
}

impl EditBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let body = self.send(self.client.get(endpoint(&self.base_url, "/api/tags")))?;
        parse_tags(&body)
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let payload = GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE),
                top_k: 50,
                top_p: 0.95,
                repeat_penalty: 1.1,
                num_predict: request.max_tokens,
                num_ctx: CONTEXT_WINDOW,
            },
        };

        debug!("Sending request to {} at {}", BACKEND, self.base_url);
        let body = self.send(
            self.client
                .post(endpoint(&self.base_url, "/api/generate"))
                .json(&payload),
        )?;

        parse_generate(&body)
    }
}

fn parse_generate(body: &str) -> Result<Completion> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| Error::malformed(BACKEND, e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(Error::malformed(BACKEND, with_pull_hint(error)));
    }

    let text = parsed
        .response
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| Error::malformed(BACKEND, "response contained no text"))?;

    Ok(Completion {
        text,
        usage: Usage {
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
        },
    })
}

fn parse_tags(body: &str) -> Result<Vec<ModelInfo>> {
    let parsed: TagsResponse = serde_json::from_str(body)
        .map_err(|e| Error::malformed(BACKEND, format!("model list: {e}")))?;

    Ok(parsed
        .models
        .into_iter()
        .map(|entry| ModelInfo {
            description: catalog::local_description(&entry.name).map(str::to_string),
            size_bytes: entry.size,
            id: entry.name,
        })
        .collect())
}

fn with_pull_hint(message: String) -> String {
    if message.contains("not found") {
        format!("{message} (install it with `ollama pull <model>`)")
    } else {
        message
    }
}
