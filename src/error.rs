use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout editor-agent.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the editor-agent library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Filesystem failure on a document, note or artifact.
    #[error("Cannot access '{path}': {message}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The run is misconfigured; raised before any backend call.
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong
        message: String,
    },

    /// Prompt template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// A backend payload could not be encoded or decoded.
    #[error("JSON error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// A `.txt` file is not valid UTF-8.
    #[error("'{path}' is not UTF-8 text; re-save it as UTF-8 or convert it to .docx")]
    InvalidUtf8 {
        /// Path to the file
        path: PathBuf,
    },

    /// A word-processor document could not be read or written.
    #[error("Document error in '{path}': {message}")]
    Document {
        /// Path to the document
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The document contains no words.
    #[error("Nothing to edit: '{path}' contains no text")]
    EmptyDocument {
        /// Path to the empty document
        path: PathBuf,
    },

    /// No eligible documents were found.
    #[error("Nothing to do: no documents with review notes found in '{path}'")]
    NoFiles {
        /// Directory that was searched
        path: PathBuf,
    },

    /// An artifact already exists at the destination.
    #[error("Refusing to overwrite existing artifact '{path}'")]
    OutputExists {
        /// Destination path
        path: PathBuf,
    },

    /// The backend rejected the credential.
    #[error("{backend} authentication failed: {message}")]
    BackendAuth {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// The backend asked the client to slow down.
    #[error("{backend} rate limit exceeded: {message}")]
    BackendRateLimit {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
        /// Server-provided delay before retrying
        retry_after: Option<Duration>,
    },

    /// The backend is temporarily unavailable.
    #[error("{backend} unavailable: {message}")]
    BackendUnavailable {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// The backend returned a body that could not be understood.
    #[error("{backend} returned a malformed response: {message}")]
    BackendMalformedResponse {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// The backend refused the request permanently (bad model name, bad payload).
    #[error("{backend} rejected the request (HTTP {status}): {message}")]
    BackendRejected {
        /// Backend name
        backend: String,
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// The local inference service is not running.
    #[error("{backend} is not running at {url}")]
    ServiceNotRunning {
        /// Backend name
        backend: String,
        /// Base URL that refused the connection
        url: String,
    },

    /// The edited text looks like a summary rather than an edit.
    #[error("Edited text looks like a summary ({reason}); word ratio {ratio:.2}")]
    SuspiciousSummary {
        /// Edited words divided by original words
        ratio: f64,
        /// Why the result was flagged
        reason: String,
    },
}

impl Error {
    /// Wraps an IO error with the path it concerns.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Template failure attributed to `template`.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        Self::Template {
            template: template.into(),
            message: source.to_string(),
        }
    }

    /// Non-UTF-8 text at `path`.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a document format error.
    #[must_use]
    pub fn document(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Document {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an empty document error.
    #[must_use]
    pub fn empty_document(path: impl Into<PathBuf>) -> Self {
        Self::EmptyDocument { path: path.into() }
    }

    /// Nothing eligible was found under `path`.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>) -> Self {
        Self::NoFiles { path: path.into() }
    }

    /// Creates a backend unavailable error.
    #[must_use]
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendMalformedResponse {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Returns true for filesystem failures.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this error means the run was misconfigured or had nothing to do.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::NoFiles { .. })
    }

    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BackendRateLimit { .. } | Self::BackendUnavailable { .. }
        )
    }

    /// Returns the server-provided retry delay, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::BackendRateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::Template {
            template: "unknown".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        let err = Error::config("chunk size must be a positive word count, got 0");
        assert!(err.is_config());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("positive word count"));

        assert!(Error::no_files("original-texts").is_config());
        assert!(!Error::empty_document("essay.txt").is_config());
    }

    #[test]
    fn test_io_error_names_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io("edited-texts/essay-mistral.txt", source);
        assert!(err.is_io());
        assert!(err.to_string().contains("edited-texts/essay-mistral.txt"));
    }

    #[test]
    fn test_transient_classification() {
        let rate = Error::BackendRateLimit {
            backend: "anthropic".to_string(),
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert!(rate.is_transient());
        assert_eq!(rate.retry_after(), Some(Duration::from_secs(3)));

        assert!(Error::unavailable("ollama", "503").is_transient());
        assert!(!Error::malformed("ollama", "bad json").is_transient());

        let auth = Error::BackendAuth {
            backend: "anthropic".to_string(),
            message: "invalid x-api-key".to_string(),
        };
        assert!(!auth.is_transient());
        assert_eq!(auth.retry_after(), None);

        let down = Error::ServiceNotRunning {
            backend: "ollama".to_string(),
            url: "http://localhost:11434".to_string(),
        };
        assert!(!down.is_transient());
        assert!(down.to_string().contains("localhost:11434"));
    }

    #[test]
    fn test_json_error_conversion() {
        let source = serde_json::from_str::<serde_json::Value>("{\"model\":").unwrap_err();
        let err: Error = source.into();
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(err.to_string().starts_with("JSON error"));
    }
}
