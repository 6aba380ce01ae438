// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by the snippet store.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Neither a database handle nor a database uri was supplied.
    #[error("Need at least one of a database handle or a database uri")]
    MissingConnection,

    #[error("Expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Your file seems to be a language that is not yet supported: {0}")]
    UnsupportedLanguage(String),

    #[error("{} does not exist or is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("No registered configuration found that matches {0}")]
    UnregisteredConfig(String),

    #[error("Unknown embedding registry entry: {0}")]
    UnknownRegistry(String),

    #[error("Registry '{registry}' does not provide model '{model}'")]
    UnsupportedModel { registry: String, model: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' was not found")]
    TableNotFound(String),

    #[error("Invalid table name '{0}': only letters, digits, '_', '-' and '.' are allowed")]
    InvalidTableName(String),

    #[error("Full-text index already exists at {}; pass replace to rebuild it", .0.display())]
    IndexExists(PathBuf),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Whether this error reports a table that is already present on disk.
    pub fn is_table_exists(&self) -> bool {
        matches!(self, Error::TableExists(_))
    }
}
