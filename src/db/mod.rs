// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local vector store.
//!
//! A [`Database`] is a directory addressed by a uri. Every table lives in
//! `<uri>/<name>.table/`: rows (with their embedding vectors) are kept in
//! `rows.sqlite`, and the optional full-text index in `_indices/fts/`.
//! Vector search is a brute-force cosine scan; keyword ranking is BM25 via
//! tantivy.

pub mod fts;
pub mod query;
pub mod schema;
pub mod table;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

pub use query::{
    Filter, HybridQuery, ResultRow, ScoredRow, SearchResults, DEFAULT_LIMIT, RELEVANCE_COLUMN,
};
pub use schema::{EmbeddingDescriptor, Field, FieldKind, FieldRole, Schema, SchemaDescriptor};
pub use table::Table;

/// A flat row: column name to string value. Vectors are computed, not supplied.
pub type Record = BTreeMap<String, String>;

/// Default database location, relative to the working directory.
pub const DEFAULT_URI: &str = ".snippet-db";

const TABLE_DIR_SUFFIX: &str = ".table";

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("valid table name pattern"));

/// Handle to a database directory. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    uri: PathBuf,
}

impl Database {
    /// Opens the database at `uri`, creating the directory if needed.
    pub fn connect(uri: impl AsRef<Path>) -> Result<Self> {
        let uri = uri.as_ref();
        std::fs::create_dir_all(uri)?;
        let uri = uri.canonicalize()?;

        tracing::debug!(uri = %uri.display(), "connected to snippet database");
        Ok(Self { uri })
    }

    /// Canonical location of the database.
    pub fn uri(&self) -> &Path {
        &self.uri
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.uri)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(TABLE_DIR_SUFFIX))
            else {
                continue;
            };
            if table::Table::exists_in(&entry.path()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(table::Table::exists_in(&self.table_dir(name)?))
    }

    /// Creates a table.
    ///
    /// Fails with [`Error::TableExists`] when the table is already on disk,
    /// unless `exist_ok` is set, in which case the existing table is opened
    /// and checked against `schema`.
    pub fn create_table(&self, name: &str, schema: &Schema, exist_ok: bool) -> Result<Table> {
        let dir = self.table_dir(name)?;
        if Table::exists_in(&dir) {
            if exist_ok {
                return Table::open(&dir, name, Some(schema));
            }
            return Err(Error::TableExists(name.to_string()));
        }
        Table::create(&dir, name, schema)
    }

    /// Opens an existing table, re-binding its embedding function from the registry.
    pub fn open_table(&self, name: &str) -> Result<Table> {
        let dir = self.existing_table_dir(name)?;
        Table::open(&dir, name, None)
    }

    /// Opens an existing table with an already bound schema.
    ///
    /// Fails with [`Error::SchemaMismatch`] if the stored schema differs.
    pub fn open_table_with_schema(&self, name: &str, schema: &Schema) -> Result<Table> {
        let dir = self.existing_table_dir(name)?;
        Table::open(&dir, name, Some(schema))
    }

    /// Removes a table and its indices from disk.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let dir = self.existing_table_dir(name)?;
        std::fs::remove_dir_all(&dir)?;
        tracing::debug!(table = name, "dropped table");
        Ok(())
    }

    fn existing_table_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.table_dir(name)?;
        if !Table::exists_in(&dir) {
            return Err(Error::TableNotFound(name.to_string()));
        }
        Ok(dir)
    }

    fn table_dir(&self, name: &str) -> Result<PathBuf> {
        if !TABLE_NAME.is_match(name) {
            return Err(Error::InvalidTableName(name.to_string()));
        }
        Ok(self.uri.join(format!("{}{}", name, TABLE_DIR_SUFFIX)))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::dummy_schema;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_connect_creates_directory() {
        let dir = tempdir().unwrap();
        let uri = dir.path().join("nested").join("db");
        let db = Database::connect(&uri).unwrap();
        assert!(uri.is_dir());
        assert_eq!(db.uri(), uri.canonicalize().unwrap());
        assert!(db.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_create_existing_table() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let schema = dummy_schema(4);

        db.create_table("snippets", &schema, false).unwrap();
        assert!(db.table_exists("snippets").unwrap());

        let err = db.create_table("snippets", &schema, false).unwrap_err();
        assert!(err.is_table_exists());

        let table = db.create_table("snippets", &schema, true).unwrap();
        assert_eq!(table.name(), "snippets");
        assert_eq!(db.table_names().unwrap(), vec!["snippets"]);
    }

    #[test]
    fn test_open_missing_table() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        assert!(matches!(
            db.open_table("nope"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_table_names() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let schema = dummy_schema(4);
        for name in ["", "../escape", "a/b", ".hidden", "with space"] {
            assert!(
                matches!(
                    db.create_table(name, &schema, false),
                    Err(Error::InvalidTableName(_))
                ),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_open_rebinds_schema_and_detects_mismatch() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let schema = dummy_schema(4);
        db.create_table("snippets", &schema, false).unwrap();

        let reopened = db.open_table("snippets").unwrap();
        assert_eq!(reopened.schema(), &schema);

        let other = dummy_schema(8);
        assert!(matches!(
            db.open_table_with_schema("snippets", &other),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_drop_table() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        db.create_table("snippets", &dummy_schema(4), false).unwrap();
        db.drop_table("snippets").unwrap();
        assert!(!db.table_exists("snippets").unwrap());
        assert!(matches!(
            db.drop_table("snippets"),
            Err(Error::TableNotFound(_))
        ));
    }
}
