// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed table storage.
//!
//! Rows are stored with their non-vector columns as a JSON object and the
//! embedding as a little-endian f32 blob. The schema descriptor lives in the
//! `meta` table so a table can be reopened without the caller's schema.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::fts::FtsIndex;
use super::query::{Filter, HybridQuery};
use super::schema::{FieldKind, Schema, SchemaDescriptor};
use super::Record;
use crate::errors::{Error, Result};

const ROWS_FILE: &str = "rows.sqlite";
const FTS_INDEX_DIR: &str = "_indices/fts";
const SCHEMA_VERSION: &str = "1";

/// A row as stored on disk.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub row_id: i64,
    pub record: Record,
    pub vector: Vec<f32>,
}

/// An open table.
pub struct Table {
    name: String,
    dir: PathBuf,
    schema: Schema,
    conn: Mutex<Connection>,
}

impl Table {
    pub(crate) fn exists_in(dir: &Path) -> bool {
        dir.join(ROWS_FILE).is_file()
    }

    pub(crate) fn create(dir: &Path, name: &str, schema: &Schema) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(ROWS_FILE))?;

        let table = Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            schema: schema.clone(),
            conn: Mutex::new(conn),
        };
        table.init_schema()?;
        table.set_meta("schema_version", SCHEMA_VERSION)?;
        table.set_meta("schema", &serde_json::to_string(&schema.descriptor())?)?;

        tracing::debug!(table = name, dir = %dir.display(), "created table");
        Ok(table)
    }

    pub(crate) fn open(dir: &Path, name: &str, schema: Option<&Schema>) -> Result<Self> {
        let conn = Connection::open(dir.join(ROWS_FILE))?;

        let stored: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema'", [], |row| {
                row.get(0)
            })
            .optional()?;
        let stored = stored.ok_or_else(|| {
            Error::SchemaMismatch(format!("table '{}' has no stored schema", name))
        })?;
        let descriptor: SchemaDescriptor = serde_json::from_str(&stored)?;

        let schema = match schema {
            Some(schema) if schema.descriptor() == descriptor => schema.clone(),
            Some(schema) => {
                return Err(Error::SchemaMismatch(format!(
                    "table '{}' was created with {:?}, requested {:?}",
                    name,
                    descriptor,
                    schema.descriptor()
                )))
            }
            None => Schema::from_descriptor(descriptor)?,
        };

        tracing::debug!(table = name, "opened table");
        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            schema,
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rows (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                fields TEXT NOT NULL,
                vector BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Directory holding this table's files.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Where the full-text index lives, whether or not it has been built.
    pub fn fts_index_path(&self) -> PathBuf {
        self.dir.join(FTS_INDEX_DIR)
    }

    pub fn has_fts_index(&self) -> bool {
        FtsIndex::exists_at(&self.fts_index_path())
    }

    /// Appends rows, embedding the source column of each.
    ///
    /// Every record must carry exactly the schema's string columns. Returns the
    /// number of rows written.
    pub fn add(&self, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in records {
            self.validate_record(record)?;
        }

        let source = self.schema.source_field().name.clone();
        let texts: Vec<String> = records
            .iter()
            .map(|r| r.get(&source).cloned().unwrap_or_default())
            .collect();
        let vectors = self.schema.embedding().embed(&texts)?;

        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        // Take the index writer before touching SQLite so a busy index leaves
        // the table untouched.
        let mut fts = if self.has_fts_index() {
            let index = FtsIndex::open(&self.fts_index_path())?;
            let writer = index.writer()?;
            Some((index, writer))
        } else {
            None
        };

        let mut inserted = Vec::with_capacity(records.len());
        {
            let mut conn = self.conn();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO rows (fields, vector, created_at) VALUES (?1, ?2, ?3)",
                )?;
                for (record, vector) in records.iter().zip(vectors) {
                    let fields = serde_json::to_string(record)?;
                    stmt.execute(params![fields, embedding_to_blob(&vector), created_at])?;
                    inserted.push(StoredRow {
                        row_id: tx.last_insert_rowid(),
                        record: record.clone(),
                        vector,
                    });
                }
            }
            // An error here drops `tx`, which rolls the inserts back
            if let Some((index, writer)) = fts.as_mut() {
                index.stage_rows(writer, &inserted)?;
            }
            tx.commit()?;
        }

        if let Some((_, mut writer)) = fts {
            writer.commit()?;
        }

        tracing::debug!(table = %self.name, rows = inserted.len(), "added rows");
        Ok(inserted.len())
    }

    pub fn count_rows(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM rows", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Builds a BM25 index over a string column.
    ///
    /// Fails with [`Error::IndexExists`] if an index is already present and
    /// `replace` is false.
    pub fn create_fts_index(&self, field: &str, replace: bool) -> Result<()> {
        match self.schema.field(field) {
            Some(f) if f.kind == FieldKind::Utf8 => {}
            Some(_) => {
                return Err(Error::SchemaMismatch(format!(
                    "cannot build a full-text index over non-string field '{}'",
                    field
                )))
            }
            None => {
                return Err(Error::SchemaMismatch(format!(
                    "table '{}' has no field '{}'",
                    self.name, field
                )))
            }
        }

        let path = self.fts_index_path();
        if FtsIndex::exists_at(&path) && !replace {
            return Err(Error::IndexExists(path));
        }

        let filter_columns: Vec<String> =
            self.schema.string_fields().map(|f| f.name.clone()).collect();
        let rows = self.load_rows(None)?;
        FtsIndex::create(&path, field, &filter_columns, &rows)?;

        tracing::debug!(table = %self.name, field, rows = rows.len(), "built full-text index");
        Ok(())
    }

    /// Starts a hybrid (vector + keyword) query.
    pub fn search(&self, query: &str) -> HybridQuery<'_> {
        HybridQuery::new(self, query)
    }

    /// Loads all rows, optionally restricted to those where `column = value`.
    pub(crate) fn load_rows(&self, filter: Option<&Filter>) -> Result<Vec<StoredRow>> {
        let conn = self.conn();
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, String, Vec<u8>)> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        };

        let raw = match filter {
            Some(filter) => {
                let mut stmt = conn.prepare(
                    "SELECT row_id, fields, vector FROM rows \
                     WHERE json_extract(fields, ?1) = ?2 ORDER BY row_id",
                )?;
                let path = format!("$.\"{}\"", filter.column.replace('"', "\\\""));
                let rows = stmt
                    .query_map(params![path, filter.value], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT row_id, fields, vector FROM rows ORDER BY row_id")?;
                let rows = stmt
                    .query_map([], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        raw.into_iter()
            .map(|(row_id, fields, blob)| {
                Ok(StoredRow {
                    row_id,
                    record: serde_json::from_str(&fields)?,
                    vector: blob_to_embedding(&blob),
                })
            })
            .collect()
    }

    fn validate_record(&self, record: &Record) -> Result<()> {
        let expected: HashSet<&str> = self
            .schema
            .string_fields()
            .map(|f| f.name.as_str())
            .collect();

        if let Some(unknown) = record.keys().find(|k| !expected.contains(k.as_str())) {
            return Err(Error::SchemaMismatch(format!(
                "table '{}' has no string column '{}'",
                self.name, unknown
            )));
        }
        if let Some(missing) = expected.iter().find(|k| !record.contains_key(**k)) {
            return Err(Error::SchemaMismatch(format!(
                "record is missing column '{}'",
                missing
            )));
        }
        Ok(())
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            r#"
            INSERT INTO meta (key, value)
            VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Converts an embedding vector to a compact blob.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Converts a blob back to an embedding vector.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Computes cosine similarity between two vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{dummy_schema, record};
    use super::super::Database;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_add_and_count() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let table = db.create_table("snippets", &dummy_schema(4), false).unwrap();

        assert_eq!(table.count_rows().unwrap(), 0);
        let added = table
            .add(&[record("print(1)", "Python"), record("let x = 1;", "JavaScript")])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(table.count_rows().unwrap(), 2);
        assert_eq!(table.add(&[]).unwrap(), 0);
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        {
            let table = db.create_table("snippets", &dummy_schema(4), false).unwrap();
            table.add(&[record("print(1)", "Python")]).unwrap();
        }

        let table = db.open_table("snippets").unwrap();
        let rows = table.load_rows(None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.get("text").map(String::as_str), Some("print(1)"));
        assert_eq!(rows[0].vector.len(), 4);
    }

    #[test]
    fn test_add_rejects_wrong_columns() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let table = db.create_table("snippets", &dummy_schema(4), false).unwrap();

        let mut extra = record("a", "Python");
        extra.insert("author".into(), "me".into());
        assert!(matches!(table.add(&[extra]), Err(Error::SchemaMismatch(_))));

        let mut missing = record("a", "Python");
        missing.remove("language");
        assert!(matches!(table.add(&[missing]), Err(Error::SchemaMismatch(_))));

        assert_eq!(table.count_rows().unwrap(), 0);
    }

    #[test]
    fn test_load_rows_with_filter() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let table = db.create_table("snippets", &dummy_schema(4), false).unwrap();
        table
            .add(&[
                record("print(1)", "Python"),
                record("console.log(1)", "JavaScript"),
                record("print(2)", "Python"),
            ])
            .unwrap();

        let filter = Filter::eq("language", "Python");
        let rows = table.load_rows(Some(&filter)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|r| r.record.get("language").map(String::as_str) == Some("Python")));
    }

    #[test]
    fn test_fts_index_lifecycle() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let table = db.create_table("snippets", &dummy_schema(4), false).unwrap();
        table.add(&[record("print(1)", "Python")]).unwrap();

        assert!(!table.has_fts_index());
        table.create_fts_index("text", false).unwrap();
        assert!(table.has_fts_index());
        assert!(table.fts_index_path().ends_with("_indices/fts"));

        assert!(matches!(
            table.create_fts_index("text", false),
            Err(Error::IndexExists(_))
        ));
        table.create_fts_index("text", true).unwrap();

        assert!(matches!(
            table.create_fts_index("vector", false),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_add_is_atomic_when_index_is_locked() {
        let dir = tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        let table = db.create_table("snippets", &dummy_schema(4), false).unwrap();
        table.add(&[record("print(1)", "Python")]).unwrap();
        table.create_fts_index("text", false).unwrap();

        let held: tantivy::IndexWriter = tantivy::Index::open_in_dir(table.fts_index_path())
            .unwrap()
            .writer(15_000_000)
            .unwrap();
        assert!(matches!(
            table.add(&[record("print(2)", "Python")]),
            Err(Error::Index(_))
        ));
        assert_eq!(table.count_rows().unwrap(), 1);
        drop(held);

        table.add(&[record("print(2)", "Python")]).unwrap();
        assert_eq!(table.count_rows().unwrap(), 2);
        let index = FtsIndex::open(&table.fts_index_path()).unwrap();
        assert_eq!(index.search("print", None, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_blob_round_trip() {
        let v = vec![1.5, -2.0, 0.0];
        assert_eq!(blob_to_embedding(&embedding_to_blob(&v)), v);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }
}
