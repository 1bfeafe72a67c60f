use crate::config::{Config, RunMode};
use crate::document::{self, DocumentFormat, file_stem};
use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Prefix of lock files word processors leave next to open documents.
const LOCK_FILE_PREFIX: &str = "~$";

/// Where a review note came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteSource {
    /// Read from a file
    File(PathBuf),
    /// Given on the command line
    Inline,
}

/// Free-text review instructions for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewNote {
    /// Origin of the note
    pub source: NoteSource,
    /// Note content
    pub text: String,
}

impl ReviewNote {
    /// Reads a note from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self {
            source: NoteSource::File(path.to_path_buf()),
            text: document::read_to_text(path)?,
        })
    }

    /// Wraps inline note text.
    #[must_use]
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            source: NoteSource::Inline,
            text: text.into(),
        }
    }
}

/// A source document paired with its review note.
#[derive(Debug, Clone)]
pub struct MatchedPair {
    /// Path of the source document
    pub document_path: PathBuf,
    /// Filename stem shared by document and note
    pub stem: String,
    /// Review note for the document, or why it could not be read
    pub review_note: Result<ReviewNote>,
}

/// Result of a batch discovery.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Documents with a review note, sorted by filename
    pub pairs: Vec<MatchedPair>,
    /// Documents without a review note
    pub skipped: Vec<PathBuf>,
}

/// Finds source documents and pairs them with review notes by filename stem.
pub struct FileMatcher {
    source_dir: PathBuf,
    notes_dir: PathBuf,
    documents: GlobSet,
}

impl FileMatcher {
    /// Creates a matcher over the given directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the document glob set cannot be built.
    pub fn new(source_dir: impl Into<PathBuf>, notes_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            source_dir: source_dir.into(),
            notes_dir: notes_dir.into(),
            documents: Self::build_globset()?,
        })
    }

    /// Creates a matcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the document glob set cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.source_dir, &config.notes_dir)
    }

    fn build_globset() -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for format in DocumentFormat::all() {
            let pattern = format!("*.{}", format.extension());
            let glob = GlobBuilder::new(&pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::config(format!("Invalid glob pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    fn is_document(&self, name: &str) -> bool {
        !name.starts_with(LOCK_FILE_PREFIX) && self.documents.is_match(name)
    }

    /// Lists supported documents in the source directory, sorted by filename.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the source directory does not exist.
    pub fn source_documents(&self) -> Result<Vec<PathBuf>> {
        if !self.source_dir.is_dir() {
            return Err(Error::config(format!(
                "Source directory does not exist: {}",
                self.source_dir.display()
            )));
        }

        let walker = WalkBuilder::new(&self.source_dir)
            .standard_filters(false)
            .hidden(true)
            .max_depth(Some(1))
            .follow_links(true)
            .build();

        let mut documents = Vec::new();
        for result in walker {
            match result {
                Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                    let name = entry.file_name().to_string_lossy();
                    if self.is_document(&name) {
                        documents.push(entry.into_path());
                    } else {
                        trace!("Ignoring {}", entry.path().display());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Walk error: {}", e),
            }
        }

        documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!(
            "Found {} documents in {}",
            documents.len(),
            self.source_dir.display()
        );
        Ok(documents)
    }

    /// Pairs every source document with its review note.
    ///
    /// Documents without a note are skipped, not reported as errors. A note
    /// that exists but cannot be read stays attached to its pair as an error
    /// so only that document fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the source or notes directory cannot be listed.
    pub fn discover(&self) -> Result<Discovery> {
        let mut discovery = Discovery::default();

        for path in self.source_documents()? {
            let stem = file_stem(&path)?;
            match self.find_review_note_path(&stem)? {
                Some(note_path) => {
                    let review_note = ReviewNote::from_file(&note_path);
                    if let Err(ref e) = review_note {
                        warn!("Review notes for '{}' are unreadable: {}", stem, e);
                    }
                    discovery.pairs.push(MatchedPair {
                        document_path: path,
                        stem,
                        review_note,
                    });
                }
                None => {
                    debug!("No review notes for '{}', skipping", stem);
                    discovery.skipped.push(path);
                }
            }
        }

        Ok(discovery)
    }

    /// Finds the path of the review note whose stem equals `stem`.
    ///
    /// Extensions are compared case-insensitively and `.txt` wins over `.docx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notes directory cannot be listed.
    pub fn find_review_note_path(&self, stem: &str) -> Result<Option<PathBuf>> {
        if !self.notes_dir.is_dir() {
            return Ok(None);
        }

        let entries = fs::read_dir(&self.notes_dir).map_err(|e| Error::io(&self.notes_dir, e))?;

        let mut best: Option<(usize, PathBuf)> = None;
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&self.notes_dir, e))?.path();
            if !path.is_file() || path.file_stem().and_then(|s| s.to_str()) != Some(stem) {
                continue;
            }
            let Some(format) = DocumentFormat::from_path(&path) else {
                continue;
            };
            let rank = DocumentFormat::all()
                .iter()
                .position(|f| *f == format)
                .unwrap_or(usize::MAX);
            if best.as_ref().is_none_or(|(r, _)| rank < *r) {
                best = Some((rank, path));
            }
        }

        Ok(best.map(|(_, path)| path))
    }

    /// Finds and reads the review note whose stem equals `stem`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notes directory cannot be listed or the note cannot be read.
    pub fn find_review_note(&self, stem: &str) -> Result<Option<ReviewNote>> {
        self.find_review_note_path(stem)?
            .map(|path| ReviewNote::from_file(&path))
            .transpose()
    }

    /// Resolves a single requested file and its review note.
    ///
    /// A path that does not exist is retried under the source directory by
    /// basename. `explicit` overrides stem lookup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be found, has an
    /// unsupported type, or has no review note.
    pub fn resolve(&self, file: &Path, explicit: Option<ReviewNote>) -> Result<MatchedPair> {
        let document_path = self.locate(file)?;

        if DocumentFormat::from_path(&document_path).is_none() {
            return Err(Error::config(format!(
                "Unsupported document type: {} (expected .txt or .docx)",
                document_path.display()
            )));
        }

        let stem = file_stem(&document_path)?;
        let review_note = match explicit {
            Some(note) => Ok(note),
            None => {
                let note_path = self.find_review_note_path(&stem)?.ok_or_else(|| {
                    Error::config(format!(
                        "No review notes found for '{}' in {}. Provide --review or --review-text",
                        stem,
                        self.notes_dir.display()
                    ))
                })?;
                ReviewNote::from_file(&note_path)
            }
        };

        Ok(MatchedPair {
            document_path,
            stem,
            review_note,
        })
    }

    fn locate(&self, file: &Path) -> Result<PathBuf> {
        if file.is_file() {
            return Ok(file.to_path_buf());
        }

        if let Some(name) = file.file_name() {
            let candidate = self.source_dir.join(name);
            if candidate.is_file() {
                debug!("Resolved {} to {}", file.display(), candidate.display());
                return Ok(candidate);
            }
        }

        Err(Error::config(format!("File not found: {}", file.display())))
    }
}

/// Review note given explicitly for this run, if any.
///
/// # Errors
///
/// Returns an error if the review file cannot be read.
pub fn explicit_review_note(config: &Config) -> Result<Option<ReviewNote>> {
    if let Some(ref text) = config.review_text {
        return Ok(Some(ReviewNote::inline(text.clone())));
    }
    config
        .review_file
        .as_deref()
        .map(ReviewNote::from_file)
        .transpose()
}

/// Resolves every document the run should process.
///
/// # Errors
///
/// Returns a configuration error if a requested file cannot be resolved,
/// or `NoFiles` if batch discovery finds nothing eligible.
pub fn resolve_targets(config: &Config, matcher: &FileMatcher) -> Result<Discovery> {
    match &config.mode {
        RunMode::Batch => {
            let discovery = matcher.discover()?;
            if discovery.pairs.is_empty() {
                return Err(Error::no_files(&config.source_dir));
            }
            Ok(discovery)
        }
        RunMode::Files(files) => {
            let explicit = explicit_review_note(config)?;
            let pairs = files
                .iter()
                .map(|file| matcher.resolve(file, explicit.clone()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Discovery {
                pairs,
                skipped: Vec::new(),
            })
        }
        RunMode::ListModels | RunMode::Compare(_) => Ok(Discovery::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn setup() -> (assert_fs::TempDir, FileMatcher) {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("original-texts").create_dir_all().unwrap();
        temp.child("review-notes").create_dir_all().unwrap();
        let matcher = FileMatcher::new(
            temp.child("original-texts").path(),
            temp.child("review-notes").path(),
        )
        .unwrap();
        (temp, matcher)
    }

    #[test]
    fn test_only_noted_documents_are_paired() {
        let (temp, matcher) = setup();
        temp.child("original-texts/a.txt").write_str("Alpha.").unwrap();
        temp.child("original-texts/b.txt").write_str("Beta.").unwrap();
        temp.child("review-notes/a.txt").write_str("Tighten.").unwrap();

        let discovery = matcher.discover().unwrap();

        assert_eq!(discovery.pairs.len(), 1);
        assert_eq!(discovery.pairs[0].stem, "a");
        assert_eq!(discovery.pairs[0].review_note.as_ref().unwrap().text, "Tighten.");
        assert_eq!(discovery.skipped.len(), 1);
        assert!(discovery.skipped[0].ends_with("b.txt"));
    }

    #[test]
    fn test_unreadable_note_stays_with_its_document() {
        let (temp, matcher) = setup();
        temp.child("original-texts/a.txt").write_str("Alpha.").unwrap();
        temp.child("original-texts/b.txt").write_str("Beta.").unwrap();
        temp.child("review-notes/a.txt")
            .write_binary(&[0xff, 0xfe, 0x41])
            .unwrap();
        temp.child("review-notes/b.txt").write_str("Tighten.").unwrap();

        let discovery = matcher.discover().unwrap();

        assert_eq!(discovery.pairs.len(), 2);
        assert!(matches!(
            discovery.pairs[0].review_note,
            Err(Error::InvalidUtf8 { .. })
        ));
        assert_eq!(discovery.pairs[1].review_note.as_ref().unwrap().text, "Tighten.");
    }

    #[test]
    fn test_source_listing_filters_and_sorts() {
        let (temp, matcher) = setup();
        temp.child("original-texts/zeta.txt").write_str("z").unwrap();
        temp.child("original-texts/Alpha.DOCX").write_str("x").unwrap();
        temp.child("original-texts/beta.txt").write_str("b").unwrap();
        temp.child("original-texts/notes.md").write_str("m").unwrap();
        temp.child("original-texts/~$beta.docx").write_str("lock").unwrap();
        temp.child("original-texts/.hidden.txt").write_str("h").unwrap();
        temp.child("original-texts/nested/deep.txt").write_str("d").unwrap();

        let names: Vec<_> = matcher
            .source_documents()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["Alpha.DOCX", "beta.txt", "zeta.txt"]);
    }

    #[test]
    fn test_note_lookup_prefers_txt() {
        let (temp, matcher) = setup();
        temp.child("review-notes/essay.docx").write_str("not read").unwrap();
        temp.child("review-notes/essay.txt").write_str("Use the txt.").unwrap();

        let note = matcher.find_review_note("essay").unwrap().unwrap();
        assert_eq!(note.text, "Use the txt.");
        assert!(matches!(note.source, NoteSource::File(ref p) if p.ends_with("essay.txt")));
    }

    #[test]
    fn test_note_lookup_is_extension_case_insensitive() {
        let (temp, matcher) = setup();
        temp.child("review-notes/essay.TXT").write_str("Upper.").unwrap();

        let note = matcher.find_review_note("essay").unwrap().unwrap();
        assert_eq!(note.text, "Upper.");
        assert!(matcher.find_review_note("other").unwrap().is_none());
    }

    #[test]
    fn test_missing_notes_dir_means_no_note() {
        let temp = assert_fs::TempDir::new().unwrap();
        let matcher = FileMatcher::new(temp.path(), temp.path().join("absent")).unwrap();
        assert!(matcher.find_review_note("essay").unwrap().is_none());
    }

    #[test]
    fn test_resolve_with_explicit_note() {
        let (temp, matcher) = setup();
        let file = temp.child("original-texts/essay.txt");
        file.write_str("Text.").unwrap();

        let pair = matcher
            .resolve(file.path(), Some(ReviewNote::inline("Be brief.")))
            .unwrap();
        assert_eq!(pair.stem, "essay");
        assert_eq!(pair.review_note.as_ref().unwrap().source, NoteSource::Inline);
    }

    #[test]
    fn test_resolve_falls_back_to_source_dir() {
        let (temp, matcher) = setup();
        temp.child("original-texts/essay.txt").write_str("Text.").unwrap();
        temp.child("review-notes/essay.txt").write_str("Notes.").unwrap();

        let pair = matcher.resolve(Path::new("essay.txt"), None).unwrap();
        assert!(pair.document_path.starts_with(temp.child("original-texts").path()));
        assert_eq!(pair.review_note.as_ref().unwrap().text, "Notes.");
    }

    #[test]
    fn test_resolve_without_note_is_config_error() {
        let (temp, matcher) = setup();
        let file = temp.child("original-texts/essay.txt");
        file.write_str("Text.").unwrap();

        let err = matcher.resolve(file.path(), None).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("--review"));
    }

    #[test]
    fn test_resolve_missing_file() {
        let (_temp, matcher) = setup();
        let err = matcher.resolve(Path::new("nowhere.txt"), None).unwrap_err();
        assert!(err.is_config());
    }
}
