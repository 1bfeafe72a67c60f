use crate::error::{Error, Result};
use crate::text::{PARAGRAPH_SEPARATOR, count_paragraphs, count_words};
use tracing::{debug, trace};

/// A contiguous run of a document's paragraphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Sequential chunk index (0-based)
    pub index: usize,

    /// Paragraphs joined with a blank line, exactly as in the source
    pub text: String,

    /// Whitespace-separated words in this chunk
    pub word_count: usize,

    /// Non-blank paragraphs in this chunk
    pub paragraph_count: usize,
}

impl Chunk {
    /// Creates a new chunk.
    #[must_use]
    pub fn new(index: usize, text: String) -> Self {
        Self {
            index,
            word_count: count_words(&text),
            paragraph_count: count_paragraphs(&text),
            text,
        }
    }

    /// Returns the budget utilization (0.0 to 1.0, above 1.0 for oversized paragraphs).
    #[must_use]
    pub fn utilization(&self, max_words: usize) -> f64 {
        if max_words == 0 {
            return 0.0;
        }
        self.word_count as f64 / max_words as f64
    }
}

/// Splits document text into chunks on paragraph boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    max_words: Option<usize>,
}

impl Splitter {
    /// Creates a splitter with an optional word budget per chunk.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the budget is zero or negative.
    pub fn new(max_words: Option<i64>) -> Result<Self> {
        let max_words = match max_words {
            None => None,
            Some(n) if n > 0 => Some(usize::try_from(n).unwrap_or(usize::MAX)),
            Some(n) => {
                return Err(Error::config(format!(
                    "chunk size must be a positive word count, got {n}"
                )));
            }
        };
        Ok(Self { max_words })
    }

    /// A splitter that keeps every document whole.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { max_words: None }
    }

    /// Returns the word budget, if any.
    #[must_use]
    pub const fn max_words(&self) -> Option<usize> {
        self.max_words
    }

    /// Splits `text` into ordered chunks.
    ///
    /// # Algorithm
    ///
    /// 1. Paragraphs (separated by a blank line) are accumulated in order
    /// 2. When the next paragraph would exceed the budget, the chunk is closed
    /// 3. A paragraph larger than the budget becomes a chunk of its own
    ///
    /// Joining the chunk texts with a blank line reproduces `text` exactly.
    /// Returns an empty vector when `text` contains no words.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if count_words(text) == 0 {
            return Vec::new();
        }

        let Some(max_words) = self.max_words else {
            return vec![Chunk::new(0, text.to_string())];
        };

        let mut chunks = Vec::new();
        let mut builder = ChunkBuilder::new(0, max_words);

        for paragraph in text.split(PARAGRAPH_SEPARATOR) {
            let words = count_words(paragraph);
            if words > max_words {
                debug!(
                    "Paragraph of {} words exceeds chunk size {}, keeping it whole",
                    words, max_words
                );
            }

            if !builder.can_fit(words) {
                let finished =
                    std::mem::replace(&mut builder, ChunkBuilder::new(chunks.len() + 1, max_words));
                if let Some(chunk) = finished.build() {
                    chunks.push(chunk);
                }
            }

            builder.add(paragraph, words);
        }

        if let Some(chunk) = builder.build() {
            chunks.push(chunk);
        }

        self.log_split_results(&chunks, max_words);
        chunks
    }

    fn log_split_results(&self, chunks: &[Chunk], max_words: usize) {
        if chunks.is_empty() {
            return;
        }

        let avg_utilization = chunks
            .iter()
            .map(|c| c.utilization(max_words))
            .sum::<f64>()
            / chunks.len() as f64;

        trace!(
            "Created {} chunks (avg utilization: {:.1}%)",
            chunks.len(),
            avg_utilization * 100.0
        );
    }
}

/// Builder for constructing chunks incrementally.
struct ChunkBuilder<'a> {
    index: usize,
    paragraphs: Vec<&'a str>,
    current_words: usize,
    max_words: usize,
}

impl<'a> ChunkBuilder<'a> {
    fn new(index: usize, max_words: usize) -> Self {
        Self {
            index,
            paragraphs: Vec::new(),
            current_words: 0,
            max_words,
        }
    }

    /// Blank paragraphs always fit so they stay with their neighbours.
    fn can_fit(&self, words: usize) -> bool {
        self.paragraphs.is_empty()
            || words == 0
            || self.current_words + words <= self.max_words
    }

    fn add(&mut self, paragraph: &'a str, words: usize) {
        self.current_words += words;
        self.paragraphs.push(paragraph);
    }

    fn build(self) -> Option<Chunk> {
        if self.paragraphs.is_empty() {
            None
        } else {
            Some(Chunk::new(
                self.index,
                self.paragraphs.join(PARAGRAPH_SEPARATOR),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize, word: &str) -> String {
        vec![word; n].join(" ")
    }

    fn rejoin(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR)
    }

    #[test]
    fn test_non_positive_size_rejected() {
        assert!(Splitter::new(Some(0)).unwrap_err().is_config());
        assert!(Splitter::new(Some(-3)).unwrap_err().is_config());
        assert!(Splitter::new(Some(1)).is_ok());
        assert!(Splitter::new(None).is_ok());
    }

    #[test]
    fn test_unbounded_keeps_whole_document() {
        let text = format!("{}\n\n{}", words(3000, "alpha"), words(3000, "beta"));
        let chunks = Splitter::unbounded().split(&text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].word_count, 6000);
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        let splitter = Splitter::new(Some(10)).unwrap();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("  \n\n \t\n\n").is_empty());
    }

    #[test]
    fn test_paragraphs_grouped_within_budget() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            words(4, "a"),
            words(4, "b"),
            words(4, "c")
        );
        let chunks = Splitter::new(Some(8)).unwrap().split(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].word_count, 8);
        assert_eq!(chunks[0].paragraph_count, 2);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].text, words(4, "c"));
    }

    #[test]
    fn test_oversized_paragraph_is_its_own_chunk() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            words(2, "small"),
            words(50, "huge"),
            words(2, "tail")
        );
        let chunks = Splitter::new(Some(10)).unwrap().split(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, words(50, "huge"));
        assert!(chunks[1].utilization(10) > 1.0);
        for chunk in &chunks {
            assert!(chunk.word_count <= 10 || chunk.paragraph_count == 1);
        }
    }

    #[test]
    fn test_rejoin_is_byte_exact() {
        let text = "Intro line one.\nIntro line two.\n\n\n\nAfter a gap.  \n\n   indented start\n\nlast";
        for size in 1..=12 {
            let chunks = Splitter::new(Some(size)).unwrap().split(text);
            assert_eq!(rejoin(&chunks), text, "chunk size {size}");

            let indexes: Vec<_> = chunks.iter().map(|c| c.index).collect();
            let expected: Vec<_> = (0..chunks.len()).collect();
            assert_eq!(indexes, expected);
        }
    }

    #[test]
    fn test_blank_paragraphs_do_not_form_chunks() {
        let text = format!("{}\n\n\n\n{}", words(10, "x"), words(10, "y"));
        let chunks = Splitter::new(Some(10)).unwrap().split(&text);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.word_count == 10));
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn test_essay_scenario_two_chunks() {
        let text = format!(
            "{}\n\n{}\n\n{}",
            words(1200, "one"),
            words(800, "two"),
            words(2000, "three")
        );
        let chunks = Splitter::new(Some(2000)).unwrap().split(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].word_count, 2000);
        assert_eq!(chunks[0].paragraph_count, 2);
        assert_eq!(chunks[1].word_count, 2000);
        assert_eq!(rejoin(&chunks), text);
    }
}
