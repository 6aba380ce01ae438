// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid query execution.
//!
//! A query runs two legs over the (optionally filtered) rows of a table: a
//! cosine scan against the query embedding, and a BM25 keyword search if the
//! table has a full-text index. The union of both legs is scored by the
//! default linear combination, then passed through any extra rerankers in
//! the order they were attached, and finally cut to the limit.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::fts::FtsIndex;
use super::table::{cosine_similarity, StoredRow, Table};
use super::Record;
use crate::errors::{Error, Result};
use crate::rerankers::{LinearCombinationReranker, Reranker};

/// Name of the relevance column appended to every result set.
pub const RELEVANCE_COLUMN: &str = "_relevance_score";

/// Default number of rows returned by a query.
pub const DEFAULT_LIMIT: usize = 5;

const MIN_CANDIDATES: usize = 50;

/// Equality pre-filter on a string column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// A candidate row as it moves through the reranking pipeline.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub row_id: i64,
    pub record: Record,
    pub vector: Vec<f32>,
    /// Cosine similarity to the query embedding (-1.0 to 1.0)
    pub vector_score: f32,
    /// 0-based position in the vector leg, if the row came from it
    pub vector_rank: Option<usize>,
    /// Raw BM25 score, if the row matched the keyword leg
    pub text_score: Option<f32>,
    /// 0-based position in the keyword leg
    pub text_rank: Option<usize>,
    /// Score assigned by the last reranker
    pub relevance: f32,
}

impl ScoredRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.record.get(column).map(String::as_str)
    }
}

/// Builder for a hybrid search against a [`Table`].
pub struct HybridQuery<'a> {
    table: &'a Table,
    query: String,
    filter: Option<Filter>,
    rerankers: Vec<Arc<dyn Reranker>>,
    limit: usize,
}

impl<'a> HybridQuery<'a> {
    pub(crate) fn new(table: &'a Table, query: &str) -> Self {
        Self {
            table,
            query: query.to_string(),
            filter: None,
            rerankers: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Restrict both legs to rows where `column == value`.
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(Filter::eq(column, value));
        self
    }

    /// Append a reranker. Rerankers run in attachment order, after the
    /// default linear combination.
    pub fn rerank(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.rerankers.push(reranker);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn execute(self) -> Result<SearchResults> {
        let schema = self.table.schema();
        if let Some(filter) = &self.filter {
            if !schema.string_fields().any(|f| f.name == filter.column) {
                return Err(Error::SchemaMismatch(format!(
                    "cannot filter on unknown column '{}'",
                    filter.column
                )));
            }
        }

        let mut columns = schema.column_names();
        columns.push(RELEVANCE_COLUMN.to_string());

        if self.limit == 0 {
            return Ok(SearchResults {
                columns,
                rows: Vec::new(),
            });
        }

        let candidate_k = self.limit.saturating_mul(4).max(MIN_CANDIDATES);
        let query_vector = schema.embedding().embed_query(&self.query)?;
        let rows = self.table.load_rows(self.filter.as_ref())?;

        let mut by_id: HashMap<i64, ScoredRow> = HashMap::with_capacity(rows.len());
        let mut vector_leg: Vec<(i64, f32)> = Vec::with_capacity(rows.len());
        for StoredRow {
            row_id,
            record,
            vector,
        } in rows
        {
            let score = cosine_similarity(&query_vector, &vector);
            vector_leg.push((row_id, score));
            by_id.insert(
                row_id,
                ScoredRow {
                    row_id,
                    record,
                    vector,
                    vector_score: score,
                    vector_rank: None,
                    text_score: None,
                    text_rank: None,
                    relevance: 0.0,
                },
            );
        }

        vector_leg.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        vector_leg.truncate(candidate_k);

        let mut candidates: HashMap<i64, ScoredRow> = HashMap::new();
        for (rank, (row_id, _)) in vector_leg.into_iter().enumerate() {
            if let Some(mut row) = by_id.remove(&row_id) {
                row.vector_rank = Some(rank);
                candidates.insert(row_id, row);
            }
        }

        if self.table.has_fts_index() {
            let index = FtsIndex::open(&self.table.fts_index_path())?;
            let hits = index.search(&self.query, self.filter.as_ref(), candidate_k)?;
            for (rank, (row_id, score)) in hits.into_iter().enumerate() {
                if !candidates.contains_key(&row_id) {
                    match by_id.remove(&row_id) {
                        Some(row) => {
                            candidates.insert(row_id, row);
                        }
                        None => continue,
                    }
                }
                if let Some(row) = candidates.get_mut(&row_id) {
                    row.text_score = Some(score);
                    row.text_rank = Some(rank);
                }
            }
        } else {
            tracing::warn!(
                table = self.table.name(),
                "no full-text index, keyword ranking skipped"
            );
        }

        let mut scored: Vec<ScoredRow> = candidates.into_values().collect();
        scored.sort_by_key(|r| r.row_id);

        scored = LinearCombinationReranker::default().rerank(&self.query, scored)?;
        for reranker in &self.rerankers {
            tracing::debug!(reranker = reranker.name(), "applying reranker");
            scored = reranker.rerank(&self.query, scored)?;
        }
        scored.truncate(self.limit);

        let source = schema.source_field().name.clone();
        let rows = scored
            .into_iter()
            .map(|row| ResultRow::from_scored(row, &source))
            .collect();

        Ok(SearchResults { columns, rows })
    }
}

/// Ordered result set of a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    columns: Vec<String>,
    rows: Vec<ResultRow>,
}

impl SearchResults {
    /// Schema columns followed by [`RELEVANCE_COLUMN`].
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a SearchResults {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// One row of a result set.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    /// Stable result ID (blake3 hash)
    pub result_id: String,
    #[serde(flatten)]
    pub record: Record,
    #[serde(skip_serializing)]
    pub vector: Vec<f32>,
    #[serde(rename = "_relevance_score")]
    pub relevance: f32,
    #[serde(skip_serializing)]
    pub row_id: i64,
    #[serde(skip_serializing)]
    pub vector_score: f32,
    #[serde(skip_serializing)]
    pub text_score: Option<f32>,
}

impl ResultRow {
    fn from_scored(row: ScoredRow, source: &str) -> Self {
        let text = row.record.get(source).map(String::as_str).unwrap_or("");
        let result_id = generate_result_id(row.row_id, text);
        Self {
            result_id,
            record: row.record,
            vector: row.vector,
            relevance: row.relevance,
            row_id: row.row_id,
            vector_score: row.vector_score,
            text_score: row.text_score,
        }
    }

    /// Value of a string column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.record.get(column).map(String::as_str)
    }
}

fn generate_result_id(row_id: i64, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&row_id.to_le_bytes());
    hasher.update(text.as_bytes());
    let hash = hasher.finalize();
    hash.to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{dummy_schema, record};
    use super::super::Database;
    use super::*;
    use tempfile::tempdir;

    struct Reverse;

    impl Reranker for Reverse {
        fn name(&self) -> &str {
            "reverse"
        }

        fn rerank(&self, _query: &str, mut rows: Vec<ScoredRow>) -> Result<Vec<ScoredRow>> {
            rows.reverse();
            Ok(rows)
        }
    }

    fn populated(dir: &std::path::Path) -> Table {
        let db = Database::connect(dir).unwrap();
        let table = db.create_table("snippets", &dummy_schema(4), false).unwrap();
        table
            .add(&[
                record("print(1)", "Python"),
                record("console.log(1)", "JavaScript"),
                record("def hello(): print('hello')", "Python"),
            ])
            .unwrap();
        table
    }

    #[test]
    fn test_vector_only_without_index() {
        let dir = tempdir().unwrap();
        let table = populated(dir.path());

        let results = table.search("print").limit(5).execute().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.columns(),
            &["text", "vector", "language", "filename", RELEVANCE_COLUMN]
        );
        // zero vectors: every row ties, so row order wins
        assert_eq!(results.rows()[0].get("text"), Some("print(1)"));
        assert!(results.iter().all(|r| r.text_score.is_none()));
    }

    #[test]
    fn test_keyword_leg_ranks_matches_first() {
        let dir = tempdir().unwrap();
        let table = populated(dir.path());
        table.create_fts_index("text", false).unwrap();

        let results = table.search("hello").execute().unwrap();
        let first = &results.rows()[0];
        assert_eq!(first.get("text"), Some("def hello(): print('hello')"));
        assert!(first.text_score.is_some());
        assert!(first.relevance > results.rows()[1].relevance);
    }

    #[test]
    fn test_filter_and_limit() {
        let dir = tempdir().unwrap();
        let table = populated(dir.path());
        table.create_fts_index("text", false).unwrap();

        let results = table
            .search("print")
            .where_eq("language", "Python")
            .limit(1)
            .execute()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.rows()[0].get("language"), Some("Python"));

        let none = table
            .search("print")
            .where_eq("language", "Markdown")
            .execute()
            .unwrap();
        assert!(none.is_empty());

        assert!(table.search("print").limit(0).execute().unwrap().is_empty());
    }

    #[test]
    fn test_unbounded_limit_returns_every_row() {
        let dir = tempdir().unwrap();
        let table = populated(dir.path());
        table.create_fts_index("text", false).unwrap();

        let results = table.search("print").limit(usize::MAX).execute().unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_filter_on_unknown_column() {
        let dir = tempdir().unwrap();
        let table = populated(dir.path());
        assert!(matches!(
            table.search("x").where_eq("author", "me").execute(),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_rerankers_run_after_default_fusion() {
        let dir = tempdir().unwrap();
        let table = populated(dir.path());

        let fused = table.search("print").execute().unwrap();
        let reversed = table
            .search("print")
            .rerank(Arc::new(Reverse))
            .execute()
            .unwrap();

        let fused_ids: Vec<i64> = fused.iter().map(|r| r.row_id).collect();
        let mut reversed_ids: Vec<i64> = reversed.iter().map(|r| r.row_id).collect();
        reversed_ids.reverse();
        assert_eq!(fused_ids, reversed_ids);
    }

    #[test]
    fn test_result_serialization() {
        let dir = tempdir().unwrap();
        let table = populated(dir.path());
        let results = table.search("print").limit(1).execute().unwrap();

        let json = serde_json::to_value(&results.rows()[0]).unwrap();
        assert_eq!(json["language"], "Python");
        assert!(json.get(RELEVANCE_COLUMN).is_some());
        assert!(json.get("vector").is_none());
        assert_eq!(json["result_id"].as_str().unwrap().len(), 16);
    }
}
