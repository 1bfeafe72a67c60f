use crate::error::{Error, Result};
use crate::text::PARAGRAPH_SEPARATOR;
use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

/// On-disk format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Plain UTF-8 text (`.txt`)
    Text,
    /// Word-processor document (`.docx`)
    Docx,
}

impl DocumentFormat {
    /// Detects the format from a path's extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Docx => "docx",
        }
    }

    /// All supported formats, in lookup preference order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Text, Self::Docx]
    }
}

/// A source document loaded for editing.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path the document was read from
    pub path: PathBuf,

    /// Filename without extension
    pub stem: String,

    /// Format of the source file
    pub format: DocumentFormat,

    /// Paragraphs joined with a blank line
    pub text: String,
}

impl Document {
    /// Loads a document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unsupported, the file cannot be
    /// read, or its content cannot be decoded.
    pub fn load(path: &Path) -> Result<Self> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            Error::config(format!(
                "Unsupported document type: {} (expected .txt or .docx)",
                path.display()
            ))
        })?;

        let stem = file_stem(path)?;
        let text = read_content(path, format)?;

        Ok(Self {
            path: path.to_path_buf(),
            stem,
            format,
            text,
        })
    }
}

/// Reads a `.txt` or `.docx` file as text, falling back to plain text for
/// any other extension (style guides are usually Markdown).
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn read_to_text(path: &Path) -> Result<String> {
    read_content(path, DocumentFormat::from_path(path).unwrap_or(DocumentFormat::Text))
}

/// Returns the filename stem of `path` as UTF-8.
pub(crate) fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::config(format!("Invalid file name: {}", path.display())))
}

fn read_content(path: &Path, format: DocumentFormat) -> Result<String> {
    match format {
        DocumentFormat::Text => read_plain(path),
        DocumentFormat::Docx => read_docx(path),
    }
}

fn read_plain(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    String::from_utf8(bytes).map_err(|_| Error::invalid_utf8(path))
}

/// Flattens a `.docx` file to its non-empty paragraph texts.
fn read_docx(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| Error::document(path, e.to_string()))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(p) => Some(paragraph_text(&p.children)),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .collect();

    Ok(paragraphs.join(PARAGRAPH_SEPARATOR))
}

fn paragraph_text(children: &[docx_rs::ParagraphChild]) -> String {
    let mut text = String::new();
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                        docx_rs::RunChild::Tab(_) => text.push('\t'),
                        docx_rs::RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            docx_rs::ParagraphChild::Hyperlink(link) => {
                text.push_str(&paragraph_text(&link.children));
            }
            _ => {}
        }
    }
    text
}

/// Writes `text` as a `.docx`, one paragraph per blank-line separated block.
pub(crate) fn write_docx<W: Write + Seek>(writer: W, text: &str, path: &Path) -> Result<()> {
    let docx = text
        .split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .fold(docx_rs::Docx::new(), |docx, p| {
            docx.add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(p)))
        });

    docx.build()
        .pack(writer)
        .map_err(|e| Error::document(path, e.to_string()))
}
