use crate::error::Error;
use crate::text::TextStats;
use std::fmt;
use tracing::debug;

/// Phrases that betray a summary rather than an edit.
const SUMMARY_PHRASES: &[&str] = &[
    "the text below",
    "this text",
    "this is a",
    "below is a",
    "condensed version",
    "shorter version",
    "summary of",
];

/// Number of leading words searched for summary phrases.
const LEADING_WORDS: usize = 100;

/// Why an edit was flagged as a probable summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryWarning {
    /// Edited words divided by original words
    pub ratio: f64,
    /// Human-readable reason
    pub reason: String,
}

impl fmt::Display for SummaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (edited text is {:.1}% of the original length)",
            self.reason,
            self.ratio * 100.0
        )
    }
}

impl From<SummaryWarning> for Error {
    fn from(warning: SummaryWarning) -> Self {
        Self::SuspiciousSummary {
            ratio: warning.ratio,
            reason: warning.reason,
        }
    }
}

/// Detects edits that shortened the text into a summary.
#[derive(Debug, Clone, Copy)]
pub struct SummaryGuard {
    min_word_ratio: f64,
}

impl SummaryGuard {
    /// Creates a guard flagging edits shorter than `min_word_ratio` of the original.
    #[must_use]
    pub const fn new(min_word_ratio: f64) -> Self {
        Self { min_word_ratio }
    }

    /// Inspects an edit, returning a warning when it looks like a summary.
    #[must_use]
    pub fn inspect(&self, original: &str, edited: &str) -> Option<SummaryWarning> {
        let before = TextStats::of(original);
        let after = TextStats::of(edited);
        let ratio = after.word_ratio(&before);

        debug!(
            original_words = before.words,
            edited_words = after.words,
            original_paragraphs = before.paragraphs,
            edited_paragraphs = after.paragraphs,
            "Word ratio {:.1}%",
            ratio * 100.0
        );

        if ratio < self.min_word_ratio {
            return Some(SummaryWarning {
                ratio,
                reason: format!(
                    "edit is below the minimum length ratio of {:.0}%",
                    self.min_word_ratio * 100.0
                ),
            });
        }

        let edited_opening = opening(edited);
        let original_opening = opening(original);

        SUMMARY_PHRASES
            .iter()
            .find(|phrase| edited_opening.contains(*phrase) && !original_opening.contains(*phrase))
            .map(|phrase| SummaryWarning {
                ratio,
                reason: format!("opening contains summary phrase \"{phrase}\""),
            })
    }
}

/// First words of `text`, lowercased and single-spaced.
fn opening(text: &str) -> String {
    text.split_whitespace()
        .take(LEADING_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
