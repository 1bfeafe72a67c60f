use crate::config::OutputFormat;
use crate::document::DocumentFormat;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

const VERSION_MARKER: &str = "-v";

/// Output location chosen for one edited document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Full path of the artifact
    pub path: PathBuf,
    /// Version suffix, `None` for the first artifact
    pub version: Option<u32>,
    /// Format to write
    pub format: DocumentFormat,
}

/// Picks non-colliding artifact names in the output directory.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl OutputNamer {
    /// Creates a namer for `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    /// Computes the next free name for `stem` edited by `model`.
    ///
    /// The base name is `<stem>-<model>`. Existing artifacts with that base
    /// (any extension) push the result to `<base>-v<N>`, where `N` is one more
    /// than the highest version present and an unversioned artifact counts
    /// as version 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory exists but cannot be listed,
    /// or if the highest existing version is `u32::MAX`.
    pub fn resolve(
        &self,
        stem: &str,
        model: &str,
        source_format: DocumentFormat,
    ) -> Result<ResolvedName> {
        let format = self.format.resolve(source_format);
        let base = format!("{}-{}", stem, sanitize_model_id(model));

        let version = match self.highest_version(&base)? {
            None => None,
            Some(highest) => Some(highest.checked_add(1).ok_or_else(|| {
                Error::config(format!(
                    "No version numbers left for '{}' in {}; move or rename older artifacts",
                    base,
                    self.output_dir.display()
                ))
            })?),
        };
        let file_name = match version {
            None => format!("{}.{}", base, format.extension()),
            Some(v) => format!("{}{}{}.{}", base, VERSION_MARKER, v, format.extension()),
        };

        trace!("Resolved output name {} (version {:?})", file_name, version);
        Ok(ResolvedName {
            path: self.output_dir.join(file_name),
            version,
            format,
        })
    }

    fn highest_version(&self, base: &str) -> Result<Option<u32>> {
        if !self.output_dir.is_dir() {
            return Ok(None);
        }

        let entries =
            fs::read_dir(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let mut highest = None;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.output_dir, e))?;
            if let Some(version) = artifact_version(&entry.path(), base) {
                highest = highest.max(Some(version));
            }
        }
        Ok(highest)
    }
}

/// Version of `path` if it is an artifact named after `base`.
fn artifact_version(path: &Path, base: &str) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    if stem == base {
        return Some(1);
    }
    match split_version(stem) {
        (name, Some(version)) if name == base => Some(version),
        _ => None,
    }
}

/// Splits a `-v<N>` suffix off an artifact file stem.
///
/// Returns the stem unchanged with `None` when there is no valid suffix.
/// Version 0 is never produced by the namer and is not treated as one.
pub(crate) fn split_version(stem: &str) -> (&str, Option<u32>) {
    stem.rsplit_once(VERSION_MARKER)
        .and_then(|(name, suffix)| {
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            suffix
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .map(|v| (name, Some(v)))
        })
        .unwrap_or((stem, None))
}

/// Reduces a model identifier to filename-safe characters.
///
/// Anything other than ASCII letters, digits, `.`, `_` and `-` becomes `-`.
#[must_use]
pub fn sanitize_model_id(model: &str) -> String {
    let sanitized: String = model
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    let trimmed = sanitized.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "model".to_string()
    } else {
        trimmed.to_string()
    }
}
