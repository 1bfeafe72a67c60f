//! Removal of model commentary wrapped around edited text.

use tracing::debug;

/// Phrases models use to announce or sign off an edit.
const COMMENTARY_PHRASES: &[&str] = &[
    "This text has been edited",
    "I have edited the text",
    "The edited text follows",
    "Here is the edited text",
    "I've maintained the full length",
    "I've preserved all content",
    "This edit maintains",
    "Edited according to",
    "Following the style guidelines",
    "As per the instructions",
];

/// Delimiters that often introduce a trailing note.
const TRAILING_DELIMITERS: &[&str] = &["---", "***", "###", "```", "//"];

/// Words marking the text after a delimiter as a note about the edit.
const NOTE_MARKERS: &[&str] = &["edit", "note", "comment", "text", "follow"];

/// Only delimiters in this trailing share of the text are considered.
const TRAILING_WINDOW: f64 = 0.15;

/// Strips commentary a model added around the edited text.
///
/// A commentary phrase on the first line removes just that line; anywhere
/// else it removes the phrase and everything after it. A delimiter in the
/// last 15% of the text that is followed by a note is cut off as well.
#[must_use]
pub fn cleanup_response(text: &str) -> String {
    let mut cleaned = text.trim().to_string();

    for phrase in COMMENTARY_PHRASES {
        let Some(pos) = cleaned.find(phrase) else {
            continue;
        };

        if cleaned[..pos].trim().is_empty() {
            let rest = cleaned[pos..]
                .split_once('\n')
                .map_or("", |(_, rest)| rest);
            let removed = cleaned.len() - rest.len();
            debug!("Removed {} bytes of leading commentary ({:?})", removed, phrase);
            cleaned = rest.trim().to_string();
        } else {
            debug!(
                "Removed {} bytes of trailing commentary starting with {:?}",
                cleaned.len() - pos,
                phrase
            );
            cleaned.truncate(pos);
            cleaned = cleaned.trim().to_string();
        }
    }

    for delimiter in TRAILING_DELIMITERS {
        let search_start = floor_char_boundary(
            &cleaned,
            (cleaned.len() as f64 * (1.0 - TRAILING_WINDOW)) as usize,
        );

        let Some(offset) = cleaned[search_start..].rfind(delimiter) else {
            continue;
        };
        let pos = search_start + offset;
        if *delimiter == "//" && cleaned[..pos].ends_with(':') {
            continue;
        }

        let after = cleaned[pos..].to_lowercase();
        if NOTE_MARKERS.iter().any(|marker| after.contains(marker)) {
            debug!(
                "Removed {} bytes of trailing note after {:?}",
                cleaned.len() - pos,
                delimiter
            );
            cleaned.truncate(pos);
            cleaned = cleaned.trim().to_string();
        }
    }

    cleaned
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
