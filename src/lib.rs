//! # editor-agent
//!
//! Edits manuscripts against a shared style guide and per-document review
//! notes using a remote (Anthropic) or local (Ollama) language model.
//!
//! ## Features
//!
//! - Batch matching of source documents with review notes by filename stem
//! - Paragraph-preserving chunking with an optional word budget
//! - Summary detection with one corrective regeneration
//! - Versioned, never-overwriting output artifacts (`.txt` or `.docx`)
//! - Bounded retries with backoff for transient backend failures
//! - Pairwise diffs and statistics across the edited versions of a document
//!
//! ## Quick Start
//!
//! ```no_run
//! use editor_agent::{BackendKind, Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .backend(BackendKind::Local)
//!     .model("mistral")
//!     .source_dir("./original-texts")
//!     .notes_dir("./review-notes")
//!     .output_dir("./edited-texts")
//!     .chunk_size(2000)
//!     .build()?;
//!
//! let report = Pipeline::new(config)?.run()?;
//! report.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Matcher**: pairs documents with review notes
//! 2. **Splitter**: divides text into paragraph-aligned chunks
//! 3. **Invoker**: prompts the backend per chunk and guards against summaries
//! 4. **Reassembler**: joins edited chunks in order
//! 5. **Namer / Writer**: picks a fresh versioned name and persists atomically

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod catalog;
mod cleanup;
mod compare;
mod config;
mod document;
mod error;
mod guard;
mod invoker;
mod matcher;
mod namer;
mod pipeline;
mod prompt;
mod reassemble;
mod retry;
mod splitter;
mod text;
mod writer;

pub mod backend;

#[cfg(test)]
mod test_support;

pub use catalog::{ModelProfile, estimate_cost, local_models, remote_models};
pub use compare::{ArtifactSummary, Comparison, DiffLine, OutputComparer, PairDiff, unified_diff};
pub use config::{BackendKind, Config, ConfigBuilder, OutputFormat, RunMode};
pub use document::{Document, DocumentFormat};
pub use error::{Error, Result};
pub use guard::SummaryWarning;
pub use matcher::{Discovery, FileMatcher, MatchedPair, NoteSource, ReviewNote};
pub use namer::{OutputNamer, ResolvedName, sanitize_model_id};
pub use pipeline::{BatchReport, DocumentOutcome, DocumentStatus, Pipeline};
pub use retry::RetryPolicy;
pub use splitter::{Chunk, Splitter};
pub use text::TextStats;

use crate::backend::ModelInfo;
use tracing::{info, warn};

/// Runs the complete editing pipeline with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - No document has review notes
/// - The backend client cannot be created
///
/// Per-document failures are reported in the returned [`BatchReport`].
pub fn run(config: Config) -> Result<BatchReport> {
    Pipeline::new(config)?.run()
}

/// Lists the models available for the configured backend.
///
/// Without a credential the remote backend falls back to the built-in
/// catalog instead of querying the API.
///
/// # Errors
///
/// Returns an error if the backend cannot be reached.
pub fn list_models(config: &Config) -> Result<Vec<ModelInfo>> {
    config.validate()?;

    let has_key = config
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    if config.backend == BackendKind::Remote && !has_key {
        warn!("No API key set; showing the built-in model catalog");
        return Ok(remote_models()
            .iter()
            .map(|profile| ModelInfo {
                id: profile.id.to_string(),
                description: Some(profile.description.to_string()),
                size_bytes: None,
            })
            .collect());
    }

    let backend = backend::create(config)?;
    let models = backend.list_models()?;
    info!("{} reported {} models", backend.name(), models.len());
    Ok(models)
}

/// Compares the edited versions of the document named by
/// [`RunMode::Compare`], or of every source document when no name is given.
///
/// # Errors
///
/// Returns a configuration error if no edited versions are found.
pub fn compare(config: &Config) -> Result<Vec<Comparison>> {
    config.validate()?;

    let stem = match &config.mode {
        RunMode::Compare(stem) => stem.as_deref(),
        _ => None,
    };
    OutputComparer::from_config(config)?.compare(stem)
}
