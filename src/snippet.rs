// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snippet value object and its flat storage record.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::db::Record;
use crate::errors::{Error, Result};
use crate::languages::Language;

/// Column holding the snippet text (the embedding source).
pub const TEXT_COLUMN: &str = "text";
/// Column holding the embedding vector.
pub const VECTOR_COLUMN: &str = "vector";
/// Column holding the language display name.
pub const LANGUAGE_COLUMN: &str = "language";
/// Column holding the originating file, empty when unknown.
pub const FILENAME_COLUMN: &str = "filename";

/// A piece of source code tagged with its language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub language: Language,
    pub filename: Option<PathBuf>,
}

impl Snippet {
    pub fn new(text: impl Into<String>, language: Language) -> Self {
        Self {
            text: text.into(),
            language,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Load a snippet from a file, detecting the language from its extension.
    ///
    /// The stored filename is the canonical absolute path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }
        let path = path.canonicalize()?;

        let language = Language::from_extension(&path).map_err(|err| match err {
            Error::UnsupportedLanguage(reason) => {
                Error::UnsupportedLanguage(format!("{} ({})", path.display(), reason))
            }
            other => other,
        })?;

        let text = std::fs::read_to_string(&path)?;

        Ok(Self {
            text,
            language,
            filename: Some(path),
        })
    }

    /// Flat storage record: `{text, language, filename}`.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(TEXT_COLUMN.to_string(), self.text.clone());
        record.insert(
            LANGUAGE_COLUMN.to_string(),
            self.language.display_name().to_string(),
        );
        record.insert(
            FILENAME_COLUMN.to_string(),
            self.filename
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        );
        record
    }

    /// Rebuild a snippet from a stored record.
    pub fn from_record(record: &Record) -> Result<Self> {
        let text = record
            .get(TEXT_COLUMN)
            .ok_or_else(|| Error::SchemaMismatch(format!("record has no '{}' column", TEXT_COLUMN)))?;
        let language = record
            .get(LANGUAGE_COLUMN)
            .ok_or_else(|| {
                Error::SchemaMismatch(format!("record has no '{}' column", LANGUAGE_COLUMN))
            })?
            .parse()?;
        let filename = record
            .get(FILENAME_COLUMN)
            .filter(|f| !f.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            text: text.clone(),
            language,
            filename,
        })
    }
}
