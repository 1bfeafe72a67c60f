use crate::document::{DocumentFormat, write_docx};
use crate::error::{Error, Result};
use crate::namer::ResolvedName;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes edited documents without ever replacing an existing file.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    /// Creates a writer for `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Writes `text` to the resolved location.
    ///
    /// # Process
    ///
    /// 1. Creates the output directory if needed
    /// 2. Writes content to a temporary file in that directory
    /// 3. Syncs the temporary file to disk
    /// 4. Persists it under the final name, failing if the name is taken
    ///
    /// An interrupted write never leaves a partial file under the final name.
    ///
    /// # Errors
    ///
    /// Returns `OutputExists` if another artifact took the name, or an IO /
    /// document error if writing fails.
    pub fn write(&self, name: &ResolvedName, text: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let mut temp =
            NamedTempFile::new_in(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        match name.format {
            DocumentFormat::Text => temp
                .write_all(text.as_bytes())
                .map_err(|e| Error::io(temp.path(), e))?,
            DocumentFormat::Docx => write_docx(temp.as_file_mut(), text, &name.path)?,
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| Error::io(temp.path(), e))?;

        persist(temp, &name.path)?;

        debug!("Wrote {}", name.path.display());
        Ok(name.path.clone())
    }
}

fn persist(temp: NamedTempFile, path: &Path) -> Result<()> {
    temp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            Error::OutputExists {
                path: path.to_path_buf(),
            }
        } else {
            Error::io(path, e.error)
        }
    })?;
    Ok(())
}
