use crate::invoker::EditResult;
use crate::text::PARAGRAPH_SEPARATOR;

/// Joins edited chunks in chunk-index order with a blank line between them.
///
/// Results may arrive in any order; nothing is reflowed or deduplicated.
#[must_use]
pub fn reassemble(mut results: Vec<EditResult>) -> String {
    results.sort_by_key(|r| r.index);
    results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Usage;
    use crate::splitter::Splitter;

    fn identity(chunk: &crate::splitter::Chunk) -> EditResult {
        EditResult {
            index: chunk.index,
            text: chunk.text.clone(),
            warning: None,
            usage: Usage::default(),
            regenerated: false,
        }
    }

    #[test]
    fn test_orders_by_index() {
        let results = vec![
            EditResult {
                index: 2,
                text: "third".into(),
                warning: None,
                usage: Usage::default(),
                regenerated: false,
            },
            EditResult {
                index: 0,
                text: "first".into(),
                warning: None,
                usage: Usage::default(),
                regenerated: false,
            },
            EditResult {
                index: 1,
                text: "second".into(),
                warning: None,
                usage: Usage::default(),
                regenerated: false,
            },
        ];

        assert_eq!(reassemble(results), "first\n\nsecond\n\nthird");
    }

    #[test]
    fn test_identity_round_trip_for_all_sizes() {
        let text = "Call me Ishmael. Some years ago.\n\nNever mind how long precisely.\n\n\n\n\
                    Having little or no money in my purse,\nand nothing particular.\n\n  I thought I would sail.";

        for size in 1..=20 {
            let chunks = Splitter::new(Some(size)).unwrap().split(text);
            let mut results: Vec<_> = chunks.iter().map(identity).collect();
            results.reverse();

            assert_eq!(reassemble(results), text, "chunk size {size}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(reassemble(Vec::new()), "");
    }
}
