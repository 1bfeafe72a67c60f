use crate::backend::{CompletionRequest, EditBackend, Usage};
use crate::catalog;
use crate::cleanup::cleanup_response;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::guard::{SummaryGuard, SummaryWarning};
use crate::prompt::{PromptContext, PromptEngine};
use crate::retry::RetryPolicy;
use crate::splitter::Chunk;
use tracing::{debug, info, warn};

/// Everything needed to edit one chunk.
#[derive(Debug, Clone, Copy)]
pub struct EditRequest<'a> {
    /// Chunk to edit
    pub chunk: &'a Chunk,
    /// Number of chunks in the document
    pub total_chunks: usize,
    /// Style guide for the run
    pub style_guide: &'a str,
    /// Review notes for the document
    pub review_note: Option<&'a str>,
}

/// Edited text for one chunk.
#[derive(Debug, Clone)]
pub struct EditResult {
    /// Index of the chunk this result belongs to
    pub index: usize,
    /// Edited text with model commentary removed
    pub text: String,
    /// Set when the edit still looks like a summary
    pub warning: Option<SummaryWarning>,
    /// Tokens consumed, including any correction attempt
    pub usage: Usage,
    /// True if a correction prompt was sent
    pub regenerated: bool,
}

/// Sends chunks to a backend and vets the responses.
pub struct EditInvoker {
    backend: Box<dyn EditBackend>,
    prompts: PromptEngine,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
    guard: SummaryGuard,
    regenerate: bool,
    strict: bool,
}

impl EditInvoker {
    /// Creates an invoker using `backend` with settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt templates fail to load.
    pub fn new(config: &Config, backend: Box<dyn EditBackend>) -> Result<Self> {
        Ok(Self {
            backend,
            prompts: PromptEngine::new()?,
            model: config.model.clone(),
            max_tokens: catalog::max_output_tokens(config.backend, &config.model),
            temperature: config.effective_temperature(),
            retry: config.retry,
            guard: SummaryGuard::new(config.min_word_ratio),
            regenerate: config.regenerate_on_summary,
            strict: config.strict,
        })
    }

    /// The backend edits are dispatched to.
    #[must_use]
    pub fn backend(&self) -> &dyn EditBackend {
        self.backend.as_ref()
    }

    /// Edits one chunk.
    ///
    /// A result that looks like a summary is re-requested once with a
    /// correction prompt (unless disabled); the longer of the two is kept.
    ///
    /// # Errors
    ///
    /// Returns the backend error once retries are exhausted, or
    /// `SuspiciousSummary` in strict mode.
    pub fn edit(&self, request: &EditRequest<'_>) -> Result<EditResult> {
        let chunk = request.chunk;
        let ctx = PromptContext::new(
            request.style_guide,
            &chunk.text,
            request.review_note,
            chunk.index,
            request.total_chunks,
        );

        debug!(
            "Editing chunk {}/{} ({} words)",
            chunk.index + 1,
            request.total_chunks,
            chunk.word_count
        );

        let (mut text, mut usage) = self.call(&self.prompts.edit(&ctx)?)?;
        let mut warning = self.guard.inspect(&chunk.text, &text);
        let mut regenerated = false;

        if let Some(first) = warning.clone().filter(|_| self.regenerate) {
            info!(
                "Chunk {}: {}; retrying with a correction prompt",
                chunk.index + 1,
                first
            );
            let (retry_text, retry_usage) = self.call(&self.prompts.correction(&ctx)?)?;
            usage += retry_usage;
            regenerated = true;

            let retry_warning = self.guard.inspect(&chunk.text, &retry_text);
            if retry_warning
                .as_ref()
                .is_none_or(|w| w.ratio > first.ratio)
            {
                text = retry_text;
                warning = retry_warning;
            }
        }

        if let Some(ref w) = warning {
            if self.strict {
                return Err(w.clone().into());
            }
            warn!("Chunk {}: {}", chunk.index + 1, w);
        }

        Ok(EditResult {
            index: chunk.index,
            text,
            warning,
            usage,
            regenerated,
        })
    }

    /// One logical call: retried on transient failures, then cleaned up.
    fn call(&self, prompt: &str) -> Result<(String, Usage)> {
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let completion = self.retry.run(|attempt| {
            if attempt > 1 {
                debug!("Attempt {} for {}", attempt, self.backend.name());
            }
            self.backend.complete(&request)
        })?;

        let text = cleanup_response(&completion.text);
        if text.is_empty() {
            return Err(Error::malformed(
                self.backend.name(),
                "response was empty after removing commentary",
            ));
        }

        Ok((text, completion.usage))
    }
}
