use crate::backend::{self, EditBackend, Usage};
use crate::catalog;
use crate::config::{BackendKind, Config};
use crate::document::{self, Document};
use crate::error::{Error, Result};
use crate::invoker::{EditInvoker, EditRequest};
use crate::matcher::{FileMatcher, MatchedPair, resolve_targets};
use crate::namer::OutputNamer;
use crate::reassemble::reassemble;
use crate::splitter::Splitter;
use crate::text::TextStats;
use crate::writer::ArtifactWriter;
use colored::Colorize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, trace, warn};

/// Attempts to find a free name when another writer takes the chosen one.
const MAX_NAME_ATTEMPTS: usize = 3;

/// What happened to one document.
#[derive(Debug, Clone)]
pub enum DocumentStatus {
    /// Edited and written
    Edited {
        /// Artifact path
        path: PathBuf,
        /// Version suffix of the artifact
        version: Option<u32>,
    },
    /// Dry run: would have been edited and written here
    Planned {
        /// Artifact path that would be used
        path: PathBuf,
    },
    /// Processing failed; nothing was written
    Failed {
        /// Cause of the failure
        error: Error,
    },
}

/// Per-document result of a run.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    /// Source document path
    pub document: PathBuf,
    /// Filename stem
    pub stem: String,
    /// Final status
    pub status: DocumentStatus,
    /// Number of chunks the document was split into
    pub chunks: usize,
    /// Statistics of the source text
    pub before: TextStats,
    /// Statistics of the edited text
    pub after: Option<TextStats>,
    /// Chunks whose edit still looked like a summary
    pub warnings: Vec<String>,
    /// Chunks re-requested with a correction prompt
    pub regenerated: usize,
    /// Backend token usage
    pub usage: Usage,
    /// Wall time spent on the document
    pub duration: Duration,
}

impl DocumentOutcome {
    fn new(pair: &MatchedPair) -> Self {
        Self {
            document: pair.document_path.clone(),
            stem: pair.stem.clone(),
            status: DocumentStatus::Failed {
                error: Error::config("document was not processed"),
            },
            chunks: 0,
            before: TextStats::default(),
            after: None,
            warnings: Vec::new(),
            regenerated: 0,
            usage: Usage::default(),
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the document failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, DocumentStatus::Failed { .. })
    }
}

/// Summary of a batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Backend used
    pub backend: BackendKind,
    /// Model used
    pub model: String,
    /// True for dry runs
    pub dry_run: bool,
    /// One outcome per processed document, in processing order
    pub outcomes: Vec<DocumentOutcome>,
    /// Source documents without review notes
    pub skipped: Vec<PathBuf>,
    /// Total execution time
    pub duration: Duration,
}

impl BatchReport {
    /// Number of documents edited and written.
    #[must_use]
    pub fn edited(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DocumentStatus::Edited { .. }))
            .count()
    }

    /// Number of documents that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Returns true if any requested document failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(DocumentOutcome::is_failed)
    }

    /// Total summary warnings across documents.
    #[must_use]
    pub fn warnings(&self) -> usize {
        self.outcomes.iter().map(|o| o.warnings.len()).sum()
    }

    /// Total chunks re-requested with a correction prompt.
    #[must_use]
    pub fn regenerated(&self) -> usize {
        self.outcomes.iter().map(|o| o.regenerated).sum()
    }

    /// Token usage across all documents.
    #[must_use]
    pub fn total_usage(&self) -> Usage {
        self.outcomes.iter().fold(Usage::default(), |mut acc, o| {
            acc += o.usage;
            acc
        })
    }

    /// Estimated cost of the run in USD.
    #[must_use]
    pub fn estimated_cost(&self) -> f64 {
        catalog::estimate_cost(self.backend, &self.model, self.total_usage())
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        let title = if self.dry_run {
            "Dry Run Summary"
        } else {
            "Editing Summary"
        };

        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║ {:<53} ║", title);
        println!("╠═══════════════════════════════════════════════════════╣");
        println!("║ Backend:              {:<31} ║", self.backend.name());
        println!("║ Model:                {:<31} ║", self.model);
        println!("║                                                       ║");
        if self.dry_run {
            println!("║ Planned:              {:>8}                        ║", self.outcomes.len() - self.failed());
        } else {
            println!("║ Edited:               {:>8}                        ║", self.edited());
        }
        println!("║ Skipped (no notes):   {:>8}                        ║", self.skipped.len());
        println!("║ Failed:               {:>8}                        ║", self.failed());
        println!("║ Summary warnings:     {:>8}                        ║", self.warnings());
        println!("║ Regenerated chunks:   {:>8}                        ║", self.regenerated());

        let usage = self.total_usage();
        if usage.total() > 0 {
            println!("║                                                       ║");
            println!("║ Input tokens:         {:>8}                        ║", usage.input_tokens);
            println!("║ Output tokens:        {:>8}                        ║", usage.output_tokens);
            if self.backend == BackendKind::Remote {
                println!("║ Estimated cost:       {:>8.4} USD                    ║", self.estimated_cost());
            }
        }
        println!("║                                                       ║");
        println!("║ Total time:           {:>8.2}s                       ║", self.duration.as_secs_f64());
        println!("╚═══════════════════════════════════════════════════════╝");

        for outcome in &self.outcomes {
            let name = outcome.document.display();
            match &outcome.status {
                DocumentStatus::Edited { path, .. } => {
                    println!("  {} {} → {}", "✓".green(), name, path.display());
                    if let Some(after) = outcome.after {
                        println!(
                            "      {} → {} words, {} → {} paragraphs",
                            outcome.before.words, after.words, outcome.before.paragraphs, after.paragraphs
                        );
                    }
                }
                DocumentStatus::Planned { path } => {
                    println!(
                        "  {} {} → {} ({} chunks, {} words)",
                        "•".cyan(),
                        name,
                        path.display(),
                        outcome.chunks,
                        outcome.before.words
                    );
                }
                DocumentStatus::Failed { error } => {
                    println!("  {} {}: {}", "✗".red(), name, error);
                }
            }
            for warning in &outcome.warnings {
                println!("      {} {}", "⚠".yellow(), warning);
            }
        }
        for path in &self.skipped {
            println!("  {} {} (no review notes)", "-".dimmed(), path.display());
        }
        println!();
    }
}

/// Orchestrates matching, splitting, editing and writing across documents.
pub struct Pipeline {
    config: Config,
    matcher: FileMatcher,
    splitter: Splitter,
    namer: OutputNamer,
    writer: ArtifactWriter,
    invoker: Option<EditInvoker>,
}

impl Pipeline {
    /// Creates a pipeline using the backend selected by `config`.
    ///
    /// No backend is created for dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The backend client cannot be created
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let backend = if config.dry_run {
            None
        } else {
            Some(backend::create(&config)?)
        };
        Self::assemble(config, backend)
    }

    /// Creates a pipeline dispatching edits to `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_backend(config: Config, backend: Box<dyn EditBackend>) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, Some(backend))
    }

    fn assemble(config: Config, backend: Option<Box<dyn EditBackend>>) -> Result<Self> {
        let invoker = backend
            .map(|b| EditInvoker::new(&config, b))
            .transpose()?;

        Ok(Self {
            matcher: FileMatcher::from_config(&config)?,
            splitter: Splitter::new(config.chunk_size)?,
            namer: OutputNamer::new(&config.output_dir, config.output_format),
            writer: ArtifactWriter::new(&config.output_dir),
            invoker,
            config,
        })
    }

    /// Executes the run and returns the batch report.
    ///
    /// # Process
    ///
    /// 1. **Match**: resolves documents and review notes
    /// 2. **Edit**: splits each document, edits every chunk and reassembles
    /// 3. **Write**: persists the result under a fresh versioned name
    ///
    /// A failing document is recorded and the run moves on to the next one.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any backend call if targets
    /// cannot be resolved, `NoFiles` if nothing is eligible, or an IO error
    /// if the style guide cannot be read.
    #[instrument(skip(self), fields(model = %self.config.model))]
    pub fn run(self) -> Result<BatchReport> {
        let start_time = Instant::now();

        info!("Stage 1/3: Matching documents with review notes...");
        let discovery = resolve_targets(&self.config, &self.matcher)?;
        info!(
            "✓ {} documents to edit, {} without review notes",
            discovery.pairs.len(),
            discovery.skipped.len()
        );

        let style_guide = document::read_to_text(&self.config.style_guide_path)?;
        debug!(
            "Loaded style guide {} ({} words)",
            self.config.style_guide_path.display(),
            TextStats::of(&style_guide).words
        );

        match self.invoker {
            Some(ref invoker) => info!(
                "Stage 2/3: Editing documents with {} ({})...",
                invoker.backend().name(),
                self.config.model
            ),
            None => warn!("Stage 2/3: Dry run mode - no backend calls, no files written"),
        }
        let total = discovery.pairs.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, pair) in discovery.pairs.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, total, pair.document_path.display());
            let outcome = self.process_document(pair, &style_guide);
            if let DocumentStatus::Failed { ref error } = outcome.status {
                error!("✗ {}: {}", pair.stem, error);
            }
            outcomes.push(outcome);
        }

        let report = BatchReport {
            backend: self.config.backend,
            model: self.config.model.clone(),
            dry_run: self.config.dry_run,
            outcomes,
            skipped: discovery.skipped,
            duration: start_time.elapsed(),
        };

        info!(
            "Stage 3/3: Done. {} edited, {} failed in {:.2}s",
            report.edited(),
            report.failed(),
            report.duration.as_secs_f64()
        );

        Ok(report)
    }

    #[instrument(skip_all, fields(stem = %pair.stem))]
    fn process_document(&self, pair: &MatchedPair, style_guide: &str) -> DocumentOutcome {
        let start = Instant::now();
        let mut outcome = DocumentOutcome::new(pair);

        outcome.status = match self.edit_document(pair, style_guide, &mut outcome) {
            Ok(status) => status,
            Err(error) => DocumentStatus::Failed { error },
        };
        outcome.duration = start.elapsed();
        outcome
    }

    fn edit_document(
        &self,
        pair: &MatchedPair,
        style_guide: &str,
        outcome: &mut DocumentOutcome,
    ) -> Result<DocumentStatus> {
        let review_note = pair.review_note.as_ref().map_err(Clone::clone)?;
        let document = Document::load(&pair.document_path)?;
        outcome.before = TextStats::of(&document.text);

        let chunks = self.splitter.split(&document.text);
        if chunks.is_empty() {
            return Err(Error::empty_document(&document.path));
        }
        outcome.chunks = chunks.len();
        debug!(
            "{} words, {} paragraphs in {} chunks",
            outcome.before.words,
            outcome.before.paragraphs,
            chunks.len()
        );
        if let Some(max_words) = self.splitter.max_words() {
            for chunk in &chunks {
                trace!(
                    "Chunk {}: {} words in {} paragraphs ({:.0}% of budget)",
                    chunk.index + 1,
                    chunk.word_count,
                    chunk.paragraph_count,
                    chunk.utilization(max_words) * 100.0
                );
            }
        }

        let Some(ref invoker) = self.invoker else {
            let name = self
                .namer
                .resolve(&document.stem, &self.config.model, document.format)?;
            info!("Dry run: would write {}", name.path.display());
            return Ok(DocumentStatus::Planned { path: name.path });
        };

        let mut results = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let result = invoker.edit(&EditRequest {
                chunk,
                total_chunks: chunks.len(),
                style_guide,
                review_note: Some(review_note.text.as_str()),
            })?;

            outcome.usage += result.usage;
            if result.regenerated {
                outcome.regenerated += 1;
            }
            if let Some(ref warning) = result.warning {
                let label = if chunks.len() > 1 {
                    format!("chunk {}/{}: {}", chunk.index + 1, chunks.len(), warning)
                } else {
                    warning.to_string()
                };
                outcome.warnings.push(label);
            }
            results.push(result);
        }

        let edited = reassemble(results);
        outcome.after = Some(TextStats::of(&edited));

        let (path, version) = self.write_artifact(&document, &edited)?;
        info!(
            "✓ Wrote {} ({} tokens, ${:.4})",
            path.display(),
            outcome.usage.total(),
            catalog::estimate_cost(self.config.backend, &self.config.model, outcome.usage)
        );

        Ok(DocumentStatus::Edited { path, version })
    }

    /// Resolves a name and writes, picking a new name if one was taken meanwhile.
    fn write_artifact(&self, document: &Document, text: &str) -> Result<(PathBuf, Option<u32>)> {
        let mut attempt = 1;
        loop {
            let name = self
                .namer
                .resolve(&document.stem, &self.config.model, document.format)?;
            match self.writer.write(&name, text) {
                Ok(path) => return Ok((path, name.version)),
                Err(Error::OutputExists { path }) if attempt < MAX_NAME_ATTEMPTS => {
                    warn!("{} appeared while writing; choosing a new name", path.display());
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use crate::retry::RetryPolicy;
    use crate::test_support::{EchoBackend, ScriptedBackend, section};
    use assert_fs::prelude::*;
    use std::fs;

    fn workspace() -> assert_fs::TempDir {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("original-texts").create_dir_all().unwrap();
        temp.child("review-notes").create_dir_all().unwrap();
        temp.child("INSTRUCTIONS.md")
            .write_str("Keep the author's voice.")
            .unwrap();
        temp
    }

    fn config(temp: &assert_fs::TempDir) -> crate::config::ConfigBuilder {
        Config::builder()
            .backend(BackendKind::Local)
            .model("mistral")
            .source_dir(temp.child("original-texts").path())
            .notes_dir(temp.child("review-notes").path())
            .output_dir(temp.child("edited-texts").path())
            .style_guide(temp.child("INSTRUCTIONS.md").path())
            .retry(RetryPolicy::immediate(2))
    }

    fn words(n: usize, word: &str) -> String {
        vec![word; n].join(" ")
    }

    #[test]
    fn test_essay_scenario() {
        let temp = workspace();
        let essay = format!(
            "{}\n\n{}\n\n{}",
            words(1200, "first"),
            words(800, "second"),
            words(2000, "third")
        );
        temp.child("original-texts/essay.txt").write_str(&essay).unwrap();
        temp.child("review-notes/essay.txt")
            .write_str("Vary sentence length.")
            .unwrap();

        let backend = EchoBackend::new();
        let calls = backend.calls();
        let pipeline =
            Pipeline::with_backend(config(&temp).chunk_size(2000).build().unwrap(), Box::new(backend))
                .unwrap();
        let report = pipeline.run().unwrap();

        assert_eq!(report.edited(), 1);
        assert!(!report.has_failures());
        assert_eq!(report.outcomes[0].chunks, 2);

        let prompts = calls.borrow();
        assert_eq!(prompts.len(), 2);
        for prompt in prompts.iter() {
            assert_eq!(section(prompt, "STYLE GUIDELINES"), Some("Keep the author's voice."));
            assert_eq!(section(prompt, "REVIEW NOTES"), Some("Vary sentence length."));
        }
        assert!(prompts[0].contains("This is chunk 1 of 2"));
        assert!(prompts[1].contains("This is chunk 2 of 2"));

        let output = temp.child("edited-texts/essay-mistral.txt");
        output.assert(essay.as_str());

        let second = Pipeline::with_backend(
            config(&temp).chunk_size(2000).build().unwrap(),
            Box::new(EchoBackend::new()),
        )
        .unwrap()
        .run()
        .unwrap();

        match &second.outcomes[0].status {
            DocumentStatus::Edited { path, version } => {
                assert!(path.ends_with("essay-mistral-v2.txt"));
                assert_eq!(*version, Some(2));
            }
            other => panic!("unexpected status {other:?}"),
        }
        output.assert(essay.as_str());
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let temp = workspace();
        for stem in ["a", "b"] {
            temp.child(format!("original-texts/{stem}.txt"))
                .write_str("alpha beta gamma")
                .unwrap();
            temp.child(format!("review-notes/{stem}.txt"))
                .write_str("Fix it.")
                .unwrap();
        }

        let backend = ScriptedBackend::new(vec![
            Err(Error::BackendAuth {
                backend: "scripted".to_string(),
                message: "invalid key".to_string(),
            }),
            Ok("alpha beta gamma".to_string()),
        ]);
        let calls = backend.calls();
        let report = Pipeline::with_backend(config(&temp).build().unwrap(), Box::new(backend))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.edited(), 1);
        assert!(report.has_failures());
        assert!(matches!(
            report.outcomes[0].status,
            DocumentStatus::Failed {
                error: Error::BackendAuth { .. }
            }
        ));

        assert!(!temp.child("edited-texts/a-mistral.txt").path().exists());
        temp.child("edited-texts/b-mistral.txt").assert("alpha beta gamma");
    }

    #[test]
    fn test_unreadable_note_fails_only_its_document() {
        let temp = workspace();
        temp.child("original-texts/a.txt").write_str("alpha beta").unwrap();
        temp.child("original-texts/b.txt").write_str("gamma delta").unwrap();
        temp.child("review-notes/a.txt")
            .write_binary(&[0xff, 0xfe, 0x41])
            .unwrap();
        temp.child("review-notes/b.txt").write_str("Fix it.").unwrap();

        let backend = EchoBackend::new();
        let calls = backend.calls();
        let report = Pipeline::with_backend(config(&temp).build().unwrap(), Box::new(backend))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(report.edited(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert!(matches!(
            report.outcomes[0].status,
            DocumentStatus::Failed {
                error: Error::InvalidUtf8 { .. }
            }
        ));
        temp.child("edited-texts/b-mistral.txt").assert("gamma delta");
    }

    #[test]
    fn test_unmatched_documents_are_skipped() {
        let temp = workspace();
        temp.child("original-texts/a.txt").write_str("alpha").unwrap();
        temp.child("original-texts/b.txt").write_str("beta").unwrap();
        temp.child("review-notes/a.txt").write_str("note").unwrap();

        let report = Pipeline::with_backend(config(&temp).build().unwrap(), Box::new(EchoBackend::new()))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].stem, "a");
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_nothing_to_do() {
        let temp = workspace();
        temp.child("original-texts/a.txt").write_str("alpha").unwrap();

        let err = Pipeline::with_backend(config(&temp).build().unwrap(), Box::new(EchoBackend::new()))
            .unwrap()
            .run()
            .unwrap_err();

        assert!(matches!(err, Error::NoFiles { .. }));
        assert!(err.is_config());
    }

    #[test]
    fn test_empty_document_fails_without_backend_call() {
        let temp = workspace();
        temp.child("original-texts/blank.txt").write_str("  \n\n ").unwrap();
        temp.child("review-notes/blank.txt").write_str("note").unwrap();

        let backend = EchoBackend::new();
        let calls = backend.calls();
        let report = Pipeline::with_backend(config(&temp).build().unwrap(), Box::new(backend))
            .unwrap()
            .run()
            .unwrap();

        assert!(calls.borrow().is_empty());
        assert!(matches!(
            report.outcomes[0].status,
            DocumentStatus::Failed {
                error: Error::EmptyDocument { .. }
            }
        ));
    }

    #[test]
    fn test_single_file_with_inline_notes() {
        let temp = workspace();
        temp.child("original-texts/essay.txt").write_str("alpha beta").unwrap();

        let config = config(&temp)
            .mode(RunMode::Files(vec![PathBuf::from("essay.txt")]))
            .review_text("Inline instructions.")
            .output_format(crate::config::OutputFormat::Docx)
            .build()
            .unwrap();

        let backend = EchoBackend::new();
        let calls = backend.calls();
        let report = Pipeline::with_backend(config, Box::new(backend))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.edited(), 1);
        assert_eq!(
            section(&calls.borrow()[0], "REVIEW NOTES"),
            Some("Inline instructions.")
        );
        let doc = Document::load(temp.child("edited-texts/essay-mistral.docx").path()).unwrap();
        assert_eq!(doc.text, "alpha beta");
    }

    #[test]
    fn test_single_file_without_notes_is_config_error() {
        let temp = workspace();
        temp.child("original-texts/essay.txt").write_str("alpha beta").unwrap();

        let config = config(&temp)
            .mode(RunMode::Files(vec![PathBuf::from("essay.txt")]))
            .build()
            .unwrap();

        let backend = EchoBackend::new();
        let calls = backend.calls();
        let err = Pipeline::with_backend(config, Box::new(backend))
            .unwrap()
            .run()
            .unwrap_err();

        assert!(err.is_config());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = workspace();
        temp.child("original-texts/essay.txt")
            .write_str(&format!("{}\n\n{}", words(5, "a"), words(5, "b")))
            .unwrap();
        temp.child("review-notes/essay.txt").write_str("note").unwrap();

        let config = config(&temp)
            .backend(BackendKind::Remote)
            .model("claude-3-haiku-20240307")
            .chunk_size(5)
            .dry_run(true)
            .build()
            .unwrap();

        let report = Pipeline::new(config).unwrap().run().unwrap();

        assert!(report.dry_run);
        assert_eq!(report.outcomes[0].chunks, 2);
        assert!(matches!(
            report.outcomes[0].status,
            DocumentStatus::Planned { ref path } if path.ends_with("essay-claude-3-haiku-20240307.txt")
        ));
        assert!(!temp.child("edited-texts").path().exists());
    }

    #[test]
    fn test_usage_is_aggregated() {
        let temp = workspace();
        temp.child("original-texts/a.txt").write_str("alpha beta").unwrap();
        temp.child("review-notes/a.txt").write_str("note").unwrap();

        let backend = ScriptedBackend::new(vec![Ok("alpha beta".to_string())]);
        let report = Pipeline::with_backend(config(&temp).build().unwrap(), Box::new(backend))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.total_usage().input_tokens, 10);
        assert_eq!(report.total_usage().output_tokens, 5);
        assert!(report.estimated_cost().abs() < f64::EPSILON);

        let written = fs::read_to_string(temp.child("edited-texts/a-mistral.txt").path()).unwrap();
        assert_eq!(written, "alpha beta");
    }
}
