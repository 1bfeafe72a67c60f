//! Text-transformation services the edits are dispatched to.
//!
//! Both backends are blocking HTTP clients behind the [`EditBackend`] trait;
//! everything above this module only sees prompts, completions and the
//! typed backend errors from [`crate::Error`].

mod anthropic;
mod ollama;

pub use anthropic::AnthropicBackend;
pub use ollama::OllamaBackend;

use crate::config::{BackendKind, Config};
use crate::error::{Error, Result};
use std::ops::AddAssign;
use std::time::Duration;

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Fully rendered prompt
    pub prompt: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Token usage reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Generated tokens
    pub output_tokens: u64,
}

impl Usage {
    /// Total tokens in both directions.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// Text generated for a request.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Token usage, zero when the backend does not report it
    pub usage: Usage,
}

/// A model offered by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Model identifier as accepted by the backend
    pub id: String,
    /// Short human-readable description
    pub description: Option<String>,
    /// On-disk size for locally installed models
    pub size_bytes: Option<u64>,
}

impl ModelInfo {
    /// Size in gigabytes, if known.
    #[must_use]
    pub fn size_gb(&self) -> Option<f64> {
        self.size_bytes
            .map(|bytes| bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// A text-completion service.
pub trait EditBackend {
    /// Backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Lists models the backend can serve.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the service cannot be queried.
    fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Generates a completion for `request`.
    ///
    /// # Errors
    ///
    /// Returns `BackendAuth`, `BackendRateLimit`, `BackendUnavailable`,
    /// `BackendMalformedResponse`, `BackendRejected` or `ServiceNotRunning`.
    fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Creates the backend selected by `config`.
///
/// # Errors
///
/// Returns a configuration error if the remote backend has no credential or
/// the HTTP client cannot be built.
pub fn create(config: &Config) -> Result<Box<dyn EditBackend>> {
    match config.backend {
        BackendKind::Remote => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| Error::config("No API key found for the remote backend"))?;
            Ok(Box::new(AnthropicBackend::new(
                &config.api_url,
                api_key,
                config.request_timeout,
            )?))
        }
        BackendKind::Local => Ok(Box::new(OllamaBackend::new(
            &config.ollama_url,
            config.request_timeout,
        )?)),
    }
}

/// Maps an unsuccessful HTTP status to the backend error taxonomy.
pub(crate) fn classify_status(
    backend: &str,
    status: u16,
    retry_after: Option<Duration>,
    message: String,
) -> Error {
    match status {
        401 | 403 => Error::BackendAuth {
            backend: backend.to_string(),
            message,
        },
        429 => Error::BackendRateLimit {
            backend: backend.to_string(),
            message,
            retry_after,
        },
        408 | 500..=599 => Error::unavailable(backend, format!("HTTP {status}: {message}")),
        _ => Error::BackendRejected {
            backend: backend.to_string(),
            status,
            message,
        },
    }
}

/// Maps a transport failure to the backend error taxonomy.
pub(crate) fn classify_transport(backend: &str, err: &reqwest::Error) -> Error {
    if err.is_decode() {
        return Error::malformed(backend, err.to_string());
    }
    Error::unavailable(backend, err.to_string())
}

/// Parses a `retry-after` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Builds a blocking HTTP client with the request timeout applied.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}

/// Joins a base URL and an absolute path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_status_classification() {
        let auth = classify_status("anthropic", 401, None, "bad key".into());
        assert!(matches!(auth, Error::BackendAuth { .. }));
        assert!(!auth.is_transient());

        let forbidden = classify_status("anthropic", 403, None, "denied".into());
        assert!(matches!(forbidden, Error::BackendAuth { .. }));

        let limited = classify_status(
            "anthropic",
            429,
            Some(Duration::from_secs(7)),
            "slow down".into(),
        );
        assert!(limited.is_transient());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));

        for status in [408, 500, 502, 503, 529] {
            let err = classify_status("anthropic", status, None, "busy".into());
            assert!(err.is_transient(), "status {status} should be transient");
        }

        let rejected = classify_status("anthropic", 400, None, "bad model".into());
        assert!(matches!(rejected, Error::BackendRejected { status: 400, .. }));
        assert!(!rejected.is_transient());
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            endpoint("http://localhost:11434/", "/api/tags"),
            "http://localhost:11434/api/tags"
        );
        assert_eq!(
            endpoint("https://api.anthropic.com", "/v1/messages"),
            "https://api.anthropic.com/v1/messages"
        );
    }

    #[test]
    fn test_usage_accumulates() {
        let mut usage = Usage::default();
        usage += Usage {
            input_tokens: 10,
            output_tokens: 4,
        };
        usage += Usage {
            input_tokens: 5,
            output_tokens: 1,
        };
        assert_eq!(usage.total(), 20);
    }

    #[test]
    fn test_model_size_in_gb() {
        let model = ModelInfo {
            id: "mistral:latest".to_string(),
            description: None,
            size_bytes: Some(4 * 1024 * 1024 * 1024),
        };
        assert!((model.size_gb().unwrap() - 4.0).abs() < f64::EPSILON);
    }
}
