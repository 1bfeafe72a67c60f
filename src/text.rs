//! Word and paragraph accounting shared by the splitter, the summary guard
//! and the run statistics.

/// Separator between paragraphs in plain-text documents.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Counts words in text (whitespace-separated).
#[inline]
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts paragraphs that contain something other than whitespace.
#[must_use]
pub fn count_paragraphs(text: &str) -> usize {
    text.split(PARAGRAPH_SEPARATOR)
        .filter(|p| !p.trim().is_empty())
        .count()
}

/// Basic size statistics for a piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStats {
    /// Whitespace-separated words
    pub words: usize,
    /// Unicode scalar values
    pub characters: usize,
    /// Non-blank paragraphs
    pub paragraphs: usize,
}

impl TextStats {
    /// Computes statistics for `text`.
    #[must_use]
    pub fn of(text: &str) -> Self {
        Self {
            words: count_words(text),
            characters: text.chars().count(),
            paragraphs: count_paragraphs(text),
        }
    }

    /// Ratio of this text's word count to `original`'s.
    ///
    /// Returns 1.0 when the original has no words.
    #[must_use]
    pub fn word_ratio(&self, original: &Self) -> f64 {
        if original.words == 0 {
            return 1.0;
        }
        self.words as f64 / original.words as f64
    }
}
