// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-text index over one string column, using tantivy for BM25 ranking
//!
//! Every other string column is mirrored as an untokenized field so keyword
//! search can be restricted with an equality filter before ranking.

use std::path::Path;
use tantivy::{
    collector::TopDocs,
    query::{BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery},
    schema::{Field, IndexRecordOption, Schema, Value, INDEXED, STORED, STRING, TEXT},
    Index, IndexWriter, TantivyDocument, Term,
};

use super::query::Filter;
use super::table::StoredRow;
use crate::errors::{Error, Result};

const ROW_ID_FIELD: &str = "row_id";
const TEXT_PREFIX: &str = "fts_";
const FILTER_PREFIX: &str = "eq_";
const WRITER_HEAP: usize = 50_000_000;

pub struct FtsIndex {
    index: Index,
    row_id: Field,
    text: Field,
    text_column: String,
    filters: Vec<(String, Field)>,
}

impl FtsIndex {
    /// Whether a tantivy index has been committed at `path`.
    pub fn exists_at(path: &Path) -> bool {
        path.join("meta.json").exists()
    }

    /// Build a fresh index at `path` over `text_column`, replacing anything there.
    pub fn create(
        path: &Path,
        text_column: &str,
        filter_columns: &[String],
        rows: &[StoredRow],
    ) -> Result<Self> {
        let mut schema_builder = Schema::builder();
        schema_builder.add_u64_field(ROW_ID_FIELD, INDEXED | STORED);
        schema_builder.add_text_field(&format!("{}{}", TEXT_PREFIX, text_column), TEXT);
        for column in filter_columns {
            schema_builder.add_text_field(&format!("{}{}", FILTER_PREFIX, column), STRING);
        }
        let schema = schema_builder.build();

        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        let index = Index::create_in_dir(path, schema)?;

        let fts = Self::from_index(index)?;
        fts.add_rows(rows)?;
        Ok(fts)
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::from_index(Index::open_in_dir(path)?)
    }

    fn from_index(index: Index) -> Result<Self> {
        let schema = index.schema();
        let row_id = schema.get_field(ROW_ID_FIELD)?;

        let mut text = None;
        let mut filters = Vec::new();
        for (field, entry) in schema.fields() {
            if let Some(column) = entry.name().strip_prefix(TEXT_PREFIX) {
                text = Some((column.to_string(), field));
            } else if let Some(column) = entry.name().strip_prefix(FILTER_PREFIX) {
                filters.push((column.to_string(), field));
            }
        }
        let (text_column, text) = text.ok_or_else(|| {
            Error::Index(tantivy::TantivyError::SchemaError(
                "full-text index has no text field".to_string(),
            ))
        })?;

        Ok(Self {
            index,
            row_id,
            text,
            text_column,
            filters,
        })
    }

    /// Column this index ranks against.
    pub fn text_column(&self) -> &str {
        &self.text_column
    }

    /// Index rows and commit.
    pub fn add_rows(&self, rows: &[StoredRow]) -> Result<()> {
        let mut writer = self.writer()?;
        self.stage_rows(&mut writer, rows)?;
        writer.commit()?;
        Ok(())
    }

    /// Take the index's single writer lock.
    ///
    /// Fails with a lock error while another writer is open on the same index.
    pub fn writer(&self) -> Result<IndexWriter> {
        Ok(self.index.writer(WRITER_HEAP)?)
    }

    /// Queue rows on `writer` without committing. Dropping the writer
    /// discards them.
    pub fn stage_rows(&self, writer: &mut IndexWriter, rows: &[StoredRow]) -> Result<()> {
        for row in rows {
            let mut doc = TantivyDocument::default();
            doc.add_u64(self.row_id, row.row_id as u64);
            if let Some(text) = row.record.get(&self.text_column) {
                doc.add_text(self.text, text);
            }
            for (column, field) in &self.filters {
                if let Some(value) = row.record.get(column) {
                    doc.add_text(*field, value);
                }
            }
            writer.add_document(doc)?;
        }
        Ok(())
    }

    /// BM25-ranked row ids for `query`, best first.
    ///
    /// Query syntax errors are tolerated; whatever parses is used. A filter
    /// on a column the index does not mirror matches nothing.
    pub fn search(&self, query: &str, filter: Option<&Filter>, limit: usize) -> Result<Vec<(i64, f32)>> {
        let query_parser = QueryParser::for_index(&self.index, vec![self.text]);
        let (text_query, errors) = query_parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!(query, errors = errors.len(), "lenient full-text parse");
        }

        let query: Box<dyn Query> = match filter {
            Some(filter) => {
                let Some(field) = self.filter_field(&filter.column) else {
                    return Ok(Vec::new());
                };
                let term = Term::from_field_text(field, &filter.value);
                let term_query = TermQuery::new(term, IndexRecordOption::Basic);
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, text_query),
                    (
                        Occur::Must,
                        Box::new(ConstScoreQuery::new(Box::new(term_query), 0.0)),
                    ),
                ]))
            }
            None => text_query,
        };

        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        // TopDocs preallocates for the limit, so never ask for more than exist
        let limit = limit.min(searcher.num_docs() as usize).max(1);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            if let Some(row_id) = doc.get_first(self.row_id).and_then(|v| v.as_u64()) {
                hits.push((row_id as i64, score));
            }
        }
        Ok(hits)
    }

    fn filter_field(&self, column: &str) -> Option<Field> {
        self.filters
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, field)| *field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Record;
    use tempfile::tempdir;

    fn row(row_id: i64, text: &str, language: &str) -> StoredRow {
        let mut record = Record::new();
        record.insert("text".into(), text.into());
        record.insert("language".into(), language.into());
        StoredRow {
            row_id,
            record,
            vector: Vec::new(),
        }
    }

    fn columns() -> Vec<String> {
        vec!["text".to_string(), "language".to_string()]
    }

    #[test]
    fn test_create_and_search() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fts");
        assert!(!FtsIndex::exists_at(&path));

        let rows = vec![
            row(1, "print hello world", "Python"),
            row(2, "console.log hello", "JavaScript"),
            row(3, "unrelated text", "Python"),
        ];
        let index = FtsIndex::create(&path, "text", &columns(), &rows).unwrap();
        assert!(FtsIndex::exists_at(&path));
        assert_eq!(index.text_column(), "text");

        let hits = index.search("hello", None, 10).unwrap();
        let ids: Vec<i64> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&1) && ids.contains(&2));
        assert!(hits.iter().all(|(_, score)| *score > 0.0));
    }

    #[test]
    fn test_search_with_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fts");
        let rows = vec![
            row(1, "print hello", "Python"),
            row(2, "console.log hello", "JavaScript"),
        ];
        let index = FtsIndex::create(&path, "text", &columns(), &rows).unwrap();

        let filter = Filter::eq("language", "JavaScript");
        let hits = index.search("hello", Some(&filter), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 2);

        let unknown = Filter::eq("author", "me");
        assert!(index.search("hello", Some(&unknown), 10).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_and_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fts");
        FtsIndex::create(&path, "text", &columns(), &[row(1, "alpha", "Python")]).unwrap();

        let index = FtsIndex::open(&path).unwrap();
        index.add_rows(&[row(2, "beta", "Python")]).unwrap();

        let hits = index.search("beta", None, 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 2);
    }

    #[test]
    fn test_malformed_query_is_lenient() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fts");
        let index =
            FtsIndex::create(&path, "text", &columns(), &[row(1, "print(1)", "Python")]).unwrap();
        assert!(index.search("print(", None, 5).is_ok());
    }
}
