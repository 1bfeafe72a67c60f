//! Side-by-side review of the edited versions of a source document.
//!
//! Every artifact named `<stem>-<model>[-vN]` in the output directory is
//! grouped under its source stem, diffed pairwise and summarized with a few
//! readability statistics.

use crate::config::Config;
use crate::document::{Document, DocumentFormat};
use crate::error::{Error, Result};
use crate::matcher::FileMatcher;
use crate::namer::split_version;
use crate::text::TextStats;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Unchanged lines shown around each change.
const CONTEXT_LINES: usize = 3;

const RULE_WIDTH: usize = 80;

/// One edited version with its statistics.
#[derive(Debug, Clone)]
pub struct ArtifactSummary {
    /// Artifact path
    pub path: PathBuf,
    /// Model identifier taken from the filename
    pub model: String,
    /// Version, 1 for the unversioned artifact
    pub version: u32,
    /// Word, character and paragraph counts
    pub stats: TextStats,
    /// Sentence-ending punctuation marks
    pub sentences: usize,
    /// Mean characters per word
    pub avg_word_length: f64,
    text: String,
}

impl ArtifactSummary {
    fn load(path: PathBuf, model: String, version: u32) -> Result<Self> {
        let text = Document::load(&path)?.text;
        let stats = TextStats::of(&text);
        let letters: usize = text.split_whitespace().map(|w| w.chars().count()).sum();

        Ok(Self {
            sentences: text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count(),
            avg_word_length: if stats.words == 0 {
                0.0
            } else {
                letters as f64 / stats.words as f64
            },
            stats,
            path,
            model,
            version,
            text,
        })
    }

    /// Model and version, e.g. `mistral` or `mistral v2`.
    #[must_use]
    pub fn label(&self) -> String {
        if self.version > 1 {
            format!("{} v{}", self.model, self.version)
        } else {
            self.model.clone()
        }
    }
}

/// A line of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// `@@ -a,b +c,d @@` header
    Hunk(String),
    /// Unchanged line
    Context(String),
    /// Line only in the left version
    Removed(String),
    /// Line only in the right version
    Added(String),
}

/// Differences between two artifacts of the same document.
#[derive(Debug, Clone)]
pub struct PairDiff {
    /// Index of the left artifact
    pub left: usize,
    /// Index of the right artifact
    pub right: usize,
    /// Unified diff lines, empty when the texts are identical
    pub lines: Vec<DiffLine>,
}

/// All edited versions of one source document.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Source filename stem
    pub stem: String,
    /// Artifacts ordered by model, then version
    pub artifacts: Vec<ArtifactSummary>,
    /// Pairwise diffs; empty when fewer than two artifacts exist
    pub diffs: Vec<PairDiff>,
}

impl Comparison {
    /// Returns true if there are at least two versions to diff.
    #[must_use]
    pub fn is_comparable(&self) -> bool {
        self.artifacts.len() >= 2
    }

    /// Prints the diffs and statistics to stdout.
    pub fn print(&self) {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        if !self.is_comparable() {
            println!(
                "Skipping {} - needs at least 2 edited versions for comparison",
                self.stem
            );
            return;
        }

        println!("\n{heavy}");
        println!("Comparing edited versions of: {}", self.stem.bold());
        println!("{heavy}");

        println!("\nFiles being compared:");
        for (i, artifact) in self.artifacts.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, artifact.path.display(), artifact.label());
        }

        for diff in &self.diffs {
            println!("\n{light}");
            println!(
                "{} vs {}",
                self.artifacts[diff.left].label(),
                self.artifacts[diff.right].label()
            );
            println!("{light}");

            if diff.lines.is_empty() {
                println!("No differences found.");
                continue;
            }
            for line in &diff.lines {
                match line {
                    DiffLine::Hunk(header) => println!("{}", header.cyan()),
                    DiffLine::Context(text) => println!(" {text}"),
                    DiffLine::Removed(text) => println!("{}", format!("-{text}").red()),
                    DiffLine::Added(text) => println!("{}", format!("+{text}").green()),
                }
            }
        }

        println!("\n{light}");
        println!("Output statistics:");
        for artifact in &self.artifacts {
            println!("  {}:", artifact.label().bold());
            println!("    - Word count: {}", artifact.stats.words);
            println!("    - Paragraph count: {}", artifact.stats.paragraphs);
            println!("    - Sentence count: {}", artifact.sentences);
            println!("    - Avg word length: {:.2}", artifact.avg_word_length);
        }
    }
}

/// Line-based unified diff of `old` against `new`.
#[must_use]
pub fn unified_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();

    for hunk in diff.unified_diff().context_radius(CONTEXT_LINES).iter_hunks() {
        lines.push(DiffLine::Hunk(hunk.header().to_string().trim_end().to_string()));
        for change in hunk.iter_changes() {
            let text = change.value().trim_end_matches(['\r', '\n']).to_string();
            lines.push(match change.tag() {
                ChangeTag::Delete => DiffLine::Removed(text),
                ChangeTag::Insert => DiffLine::Added(text),
                ChangeTag::Equal => DiffLine::Context(text),
            });
        }
    }

    lines
}

/// Groups and compares artifacts in the output directory.
pub struct OutputComparer {
    output_dir: PathBuf,
    matcher: FileMatcher,
}

impl OutputComparer {
    /// Creates a comparer over `output_dir`, using documents in `source_dir`
    /// to tell source stems apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the document glob set cannot be built.
    pub fn new(output_dir: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Result<Self> {
        let source_dir = source_dir.into();
        Ok(Self {
            output_dir: output_dir.into(),
            matcher: FileMatcher::new(&source_dir, &source_dir)?,
        })
    }

    /// Creates a comparer from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the document glob set cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.output_dir, &config.source_dir)
    }

    /// Compares the versions of `stem`, or of every source document.
    ///
    /// A stem given with an extension (`essay.txt`) is reduced to `essay`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing matches, or an error if an
    /// artifact cannot be read.
    pub fn compare(&self, stem: Option<&str>) -> Result<Vec<Comparison>> {
        let requested = stem.map(normalize_stem);

        let mut stems = self.source_stems();
        if let Some(ref s) = requested {
            stems.push(s.clone());
        }
        if stems.is_empty() {
            return Err(Error::config(
                "No source documents found; name the document to compare",
            ));
        }

        let mut groups = self.group(&stems)?;
        if let Some(ref s) = requested {
            groups.retain(|group_stem, _| group_stem == s);
        }

        if groups.is_empty() {
            return Err(Error::config(match requested {
                Some(s) => format!(
                    "No edited versions of '{}' found in {}",
                    s,
                    self.output_dir.display()
                ),
                None => format!("No edited documents found in {}", self.output_dir.display()),
            }));
        }

        groups
            .into_iter()
            .map(|(stem, entries)| build_comparison(stem, entries))
            .collect()
    }

    fn source_stems(&self) -> Vec<String> {
        self.matcher
            .source_documents()
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Assigns each artifact to the longest source stem it starts with.
    fn group(&self, stems: &[String]) -> Result<BTreeMap<String, Vec<(PathBuf, String, u32)>>> {
        let entries = fs::read_dir(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let mut groups: BTreeMap<String, Vec<(PathBuf, String, u32)>> = BTreeMap::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&self.output_dir, e))?.path();
            if !path.is_file() || DocumentFormat::from_path(&path).is_none() {
                continue;
            }
            let Some(file_stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let owner = stems
                .iter()
                .filter(|stem| {
                    file_stem
                        .strip_prefix(stem.as_str())
                        .and_then(|rest| rest.strip_prefix('-'))
                        .is_some_and(|rest| !rest.is_empty())
                })
                .max_by_key(|stem| stem.len());

            let Some(owner) = owner else {
                trace!("{} belongs to no source document", path.display());
                continue;
            };

            let (model, version) = split_version(&file_stem[owner.len() + 1..]);
            let (model, version) = (model.to_string(), version.unwrap_or(1));
            groups
                .entry(owner.clone())
                .or_default()
                .push((path, model, version));
        }

        Ok(groups)
    }
}

fn build_comparison(stem: String, entries: Vec<(PathBuf, String, u32)>) -> Result<Comparison> {
    let mut artifacts = entries
        .into_iter()
        .map(|(path, model, version)| ArtifactSummary::load(path, model, version))
        .collect::<Result<Vec<_>>>()?;
    artifacts.sort_by(|a, b| {
        a.model
            .cmp(&b.model)
            .then(a.version.cmp(&b.version))
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut diffs = Vec::new();
    for left in 0..artifacts.len() {
        for right in left + 1..artifacts.len() {
            diffs.push(PairDiff {
                left,
                right,
                lines: unified_diff(&artifacts[left].text, &artifacts[right].text),
            });
        }
    }

    debug!("{}: {} versions, {} comparisons", stem, artifacts.len(), diffs.len());
    Ok(Comparison {
        stem,
        artifacts,
        diffs,
    })
}

fn normalize_stem(name: &str) -> String {
    let name = name.trim();
    let path = Path::new(name);
    if DocumentFormat::from_path(path).is_none() {
        return name.to_string();
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}
