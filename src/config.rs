use crate::document::DocumentFormat;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SOURCE_DIR: &str = "original-texts";
const DEFAULT_NOTES_DIR: &str = "review-notes";
const DEFAULT_OUTPUT_DIR: &str = "edited-texts";
const DEFAULT_STYLE_GUIDE: &str = "INSTRUCTIONS.md";
const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_MIN_WORD_RATIO: f64 = 0.5;

/// Output format for edited documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Always write plain text
    Txt,
    /// Always write a word-processor document
    Docx,
    /// Keep the source document's format
    #[default]
    Same,
}

impl OutputFormat {
    /// Resolves the concrete format for a source document.
    #[must_use]
    pub const fn resolve(self, source: DocumentFormat) -> DocumentFormat {
        match self {
            Self::Txt => DocumentFormat::Text,
            Self::Docx => DocumentFormat::Docx,
            Self::Same => source,
        }
    }
}

/// Which text-transformation service performs the edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Anthropic Messages API
    Remote,
    /// Locally running Ollama server
    Local,
}

impl BackendKind {
    /// Human-readable backend name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Remote => "anthropic",
            Self::Local => "ollama",
        }
    }

    /// Model used when none is given.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Remote => "claude-3-haiku-20240307",
            Self::Local => "mistral",
        }
    }

    /// Sampling temperature used when none is given.
    #[must_use]
    pub const fn default_temperature(self) -> f32 {
        match self {
            Self::Remote => 0.85,
            Self::Local => 0.7,
        }
    }
}

/// What a run should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Edit every source document that has a matching review note
    Batch,
    /// Edit the given files
    Files(Vec<PathBuf>),
    /// Only list the backend's models
    ListModels,
    /// Compare edited versions in the output directory, for one source stem
    /// or for every source document
    Compare(Option<String>),
}

impl RunMode {
    /// Returns true for modes that never call a backend.
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::ListModels | Self::Compare(_))
    }
}

/// Configuration for an editing run.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// What the run should do
    pub mode: RunMode,

    /// Backend performing the edits
    pub backend: BackendKind,

    /// Model identifier passed to the backend and used in output names
    pub model: String,

    /// Directory holding source documents
    pub source_dir: PathBuf,

    /// Directory holding review notes matched by filename stem
    pub notes_dir: PathBuf,

    /// Directory receiving edited documents
    pub output_dir: PathBuf,

    /// Style guide shared by every document in the run
    pub style_guide_path: PathBuf,

    /// Review note file overriding stem lookup (single-file mode)
    pub review_file: Option<PathBuf>,

    /// Inline review note overriding stem lookup (single-file mode)
    pub review_text: Option<String>,

    /// Maximum words per chunk; `None` sends whole documents
    pub chunk_size: Option<i64>,

    /// Output format selection
    pub output_format: OutputFormat,

    /// Credential for the remote backend
    pub api_key: Option<String>,

    /// Base URL of the remote backend
    pub api_url: String,

    /// Base URL of the local backend
    pub ollama_url: String,

    /// Per-request timeout for backend calls
    pub request_timeout: Duration,

    /// Retry policy for transient backend failures
    pub retry: RetryPolicy,

    /// Edited/original word ratio below which a result is flagged as a summary
    pub min_word_ratio: f64,

    /// Re-ask the backend once with a correction prompt when a summary is suspected
    pub regenerate_on_summary: bool,

    /// Fail the document instead of writing a suspected summary
    pub strict: bool,

    /// Sampling temperature override
    pub temperature: Option<f32>,

    /// Dry run mode (no backend calls, no file writes)
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use editor_agent::{BackendKind, Config, RunMode};
    ///
    /// let config = Config::builder()
    ///     .mode(RunMode::Batch)
    ///     .backend(BackendKind::Local)
    ///     .chunk_size(2_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Chunk size, attempt count, ratio or timeout are out of range
    /// - Review note overrides are combined with batch mode or with each other
    /// - Required inputs (style guide, source directory, review file) are missing
    /// - The remote backend has no credential
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.chunk_size {
            if size <= 0 {
                return Err(Error::config(format!(
                    "chunk size must be a positive word count, got {size}"
                )));
            }
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model identifier must not be empty"));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::config("max attempts must be at least 1"));
        }

        if !(self.min_word_ratio > 0.0 && self.min_word_ratio <= 1.0) {
            return Err(Error::config(format!(
                "min word ratio must be in (0, 1], got {}",
                self.min_word_ratio
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::config("request timeout must be greater than 0"));
        }

        if self.backend == BackendKind::Remote
            && !self.dry_run
            && !self.mode.is_offline()
            && self.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(Error::config(
                "No API key found. Set the ANTHROPIC_API_KEY environment variable \
                or pass --api-key",
            ));
        }

        if self.review_file.is_some() && self.review_text.is_some() {
            return Err(Error::config(
                "review notes may come from a file or inline text, not both",
            ));
        }

        match &self.mode {
            RunMode::ListModels => return Ok(()),
            RunMode::Compare(_) => {
                if !self.output_dir.is_dir() {
                    return Err(Error::config(format!(
                        "Output directory does not exist: {}",
                        self.output_dir.display()
                    )));
                }
                return Ok(());
            }
            RunMode::Batch => {
                if self.review_file.is_some() || self.review_text.is_some() {
                    return Err(Error::config(
                        "explicit review notes apply to single files and cannot be used in batch mode",
                    ));
                }
                if !self.source_dir.is_dir() {
                    return Err(Error::config(format!(
                        "Source directory does not exist: {}",
                        self.source_dir.display()
                    )));
                }
            }
            RunMode::Files(files) => {
                if files.is_empty() {
                    return Err(Error::config(
                        "No files specified. Provide files or use batch mode",
                    ));
                }
            }
        }

        if let Some(ref review) = self.review_file {
            if !review.is_file() {
                return Err(Error::config(format!(
                    "Review notes file does not exist: {}",
                    review.display()
                )));
            }
        }

        if !self.style_guide_path.is_file() {
            return Err(Error::config(format!(
                "Style guide not found: {}",
                self.style_guide_path.display()
            )));
        }

        if self.output_dir.is_file() {
            return Err(Error::config(format!(
                "Output path is not a directory: {}",
                self.output_dir.display()
            )));
        }

        Ok(())
    }

    /// Sampling temperature for the configured backend.
    #[must_use]
    pub fn effective_temperature(&self) -> f32 {
        self.temperature
            .unwrap_or_else(|| self.backend.default_temperature())
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    mode: Option<RunMode>,
    backend: Option<BackendKind>,
    model: Option<String>,
    source_dir: Option<PathBuf>,
    notes_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    style_guide_path: Option<PathBuf>,
    review_file: Option<PathBuf>,
    review_text: Option<String>,
    chunk_size: Option<i64>,
    output_format: Option<OutputFormat>,
    api_key: Option<String>,
    api_url: Option<String>,
    ollama_url: Option<String>,
    request_timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    min_word_ratio: Option<f64>,
    regenerate_on_summary: Option<bool>,
    strict: bool,
    temperature: Option<f32>,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the run mode.
    #[must_use]
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the backend.
    #[must_use]
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the source documents directory.
    #[must_use]
    pub fn source_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(path.into());
        self
    }

    /// Sets the review notes directory.
    #[must_use]
    pub fn notes_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.notes_dir = Some(path.into());
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Sets the style guide path.
    #[must_use]
    pub fn style_guide(mut self, path: impl Into<PathBuf>) -> Self {
        self.style_guide_path = Some(path.into());
        self
    }

    /// Sets a review notes file that overrides stem lookup.
    #[must_use]
    pub fn review_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.review_file = Some(path.into());
        self
    }

    /// Sets inline review notes that override stem lookup.
    #[must_use]
    pub fn review_text(mut self, text: impl Into<String>) -> Self {
        self.review_text = Some(text.into());
        self
    }

    /// Sets the maximum words per chunk.
    ///
    /// Non-positive values are rejected by [`ConfigBuilder::build`].
    #[must_use]
    pub fn chunk_size(mut self, words: i64) -> Self {
        self.chunk_size = Some(words);
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Sets the remote backend credential.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the remote backend base URL.
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Sets the local backend base URL.
    #[must_use]
    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_url = Some(url.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Sets the summary detection threshold.
    #[must_use]
    pub fn min_word_ratio(mut self, ratio: f64) -> Self {
        self.min_word_ratio = Some(ratio);
        self
    }

    /// Enables or disables the correction retry for suspected summaries.
    #[must_use]
    pub fn regenerate_on_summary(mut self, enabled: bool) -> Self {
        self.regenerate_on_summary = Some(enabled);
        self
    }

    /// Fails documents whose edit still looks like a summary.
    #[must_use]
    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    /// Overrides the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Enables dry run mode.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let backend = self.backend.unwrap_or(BackendKind::Local);
        let config = Config {
            mode: self.mode.unwrap_or(RunMode::Batch),
            backend,
            model: self
                .model
                .unwrap_or_else(|| backend.default_model().to_string()),
            source_dir: self
                .source_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR)),
            notes_dir: self
                .notes_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NOTES_DIR)),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            style_guide_path: self
                .style_guide_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLE_GUIDE)),
            review_file: self.review_file,
            review_text: self.review_text,
            chunk_size: self.chunk_size,
            output_format: self.output_format.unwrap_or_default(),
            api_key: self.api_key,
            api_url: self
                .api_url
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_URL.to_string()),
            ollama_url: self
                .ollama_url
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            retry: self.retry.unwrap_or_default(),
            min_word_ratio: self.min_word_ratio.unwrap_or(DEFAULT_MIN_WORD_RATIO),
            regenerate_on_summary: self.regenerate_on_summary.unwrap_or(true),
            strict: self.strict,
            temperature: self.temperature,
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}
