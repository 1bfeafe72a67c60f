use crate::error::{Error, Result};
use serde::Serialize;
use tera::{Context, Tera};

const EDIT_TEMPLATE: &str = "edit";
const CORRECTION_TEMPLATE: &str = "correction";

/// Position of a chunk within a multi-chunk document (1-based).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChunkPosition {
    /// Chunk number, starting at 1
    pub number: usize,
    /// Total chunks in the document
    pub total: usize,
}

/// Inputs shared by every prompt for one chunk.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PromptContext<'a> {
    /// Style guide for the run
    pub style_guide: &'a str,
    /// Text to edit
    pub original_text: &'a str,
    /// Review notes for the document
    pub review_notes: Option<&'a str>,
    /// Present only when the document has more than one chunk
    pub chunk: Option<ChunkPosition>,
}

impl<'a> PromptContext<'a> {
    /// Builds the context for chunk `index` (0-based) of `total`.
    #[must_use]
    pub fn new(
        style_guide: &'a str,
        original_text: &'a str,
        review_notes: Option<&'a str>,
        index: usize,
        total: usize,
    ) -> Self {
        Self {
            style_guide,
            original_text,
            review_notes: review_notes.filter(|n| !n.trim().is_empty()),
            chunk: (total > 1).then_some(ChunkPosition {
                number: index + 1,
                total,
            }),
        }
    }
}

/// Renders editing prompts from the built-in templates.
pub(crate) struct PromptEngine {
    tera: Tera,
}

impl PromptEngine {
    /// Creates a new prompt engine.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(EDIT_TEMPLATE, include_str!("../templates/edit.tera"))
            .map_err(|e| Error::template(EDIT_TEMPLATE, e))?;

        tera.add_raw_template(
            CORRECTION_TEMPLATE,
            include_str!("../templates/correction.tera"),
        )
        .map_err(|e| Error::template(CORRECTION_TEMPLATE, e))?;

        Ok(Self { tera })
    }

    /// Renders the first-attempt editing prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn edit(&self, ctx: &PromptContext<'_>) -> Result<String> {
        self.render(EDIT_TEMPLATE, ctx)
    }

    /// Renders the stricter prompt used after a suspected summary.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn correction(&self, ctx: &PromptContext<'_>) -> Result<String> {
        self.render(CORRECTION_TEMPLATE, ctx)
    }

    fn render(&self, template: &str, ctx: &PromptContext<'_>) -> Result<String> {
        let context = Context::from_serialize(ctx).map_err(|e| Error::template(template, e))?;
        self.tera
            .render(template, &context)
            .map_err(|e| Error::template(template, e))
    }
}
