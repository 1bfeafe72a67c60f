//! Dry run example
//!
//! This example shows how to preview which documents would be edited,
//! how they would be chunked and where the results would be written,
//! without calling a backend or writing any files.

use editor_agent::{BackendKind, Config, DocumentStatus};

fn main() -> anyhow::Result<()> {
    // Dry runs never contact the backend, so no API key is needed
    let config = Config::builder()
        .backend(BackendKind::Remote)
        .model("claude-3-haiku-20240307")
        .source_dir("./original-texts")
        .notes_dir("./review-notes")
        .output_dir("./edited-texts")
        .chunk_size(2000)
        .dry_run(true)
        .build()?;

    println!("Running in DRY RUN mode - no files will be written\n");

    let report = editor_agent::run(config)?;

    println!("Would have edited:");
    for outcome in &report.outcomes {
        match &outcome.status {
            DocumentStatus::Planned { path } => println!(
                "  {} -> {} ({} words in {} chunks)",
                outcome.document.display(),
                path.display(),
                outcome.before.words,
                outcome.chunks
            ),
            DocumentStatus::Failed { error } => {
                println!("  {} failed: {}", outcome.document.display(), error);
            }
            DocumentStatus::Edited { .. } => {}
        }
    }
    println!();
    println!("Skipped (no review notes): {}", report.skipped.len());

    Ok(())
}
