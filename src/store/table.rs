// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snippet-typed table wrapper.

use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::config::DbConfig;
use super::factory::SchemaFactory;
use crate::db::{Database, Record, Schema, SearchResults, Table, DEFAULT_LIMIT};
use crate::errors::Result;
use crate::rerankers::Reranker;
use crate::snippet::{Snippet, LANGUAGE_COLUMN, TEXT_COLUMN};

/// Options for [`SnippetTable::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Only rows whose `language` column equals this value
    pub language: Option<String>,
    pub limit: usize,
    /// Apply the table's registered rerankers
    pub use_rerankers: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            language: None,
            limit: DEFAULT_LIMIT,
            use_rerankers: true,
        }
    }
}

impl SearchOptions {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_rerankers(mut self, enabled: bool) -> Self {
        self.use_rerankers = enabled;
        self
    }
}

/// A table of snippets bound to one [`DbConfig`].
pub struct SnippetTable {
    config: DbConfig,
    table: Table,
    rerankers: Mutex<Vec<Arc<dyn Reranker>>>,
}

impl SnippetTable {
    /// Create the table in `db`, or open it if it is already there and
    /// `exist_ok` is set.
    pub fn create(db: &Database, config: &DbConfig, name: &str, exist_ok: bool) -> Result<Self> {
        let schema = SchemaFactory::make_schema(config)?;
        let table = db.create_table(name, &schema, exist_ok)?;
        Ok(Self::from_table(config.clone(), table))
    }

    /// Create the table, falling back to opening it when it already exists.
    pub(crate) fn create_or_open(
        db: &Database,
        config: &DbConfig,
        schema: &Schema,
        name: &str,
    ) -> Result<Self> {
        let table = match db.create_table(name, schema, false) {
            Ok(table) => table,
            Err(err) if err.is_table_exists() => {
                tracing::debug!(table = name, "table exists, opening");
                db.open_table_with_schema(name, schema)?
            }
            Err(err) => return Err(err),
        };
        Ok(Self::from_table(config.clone(), table))
    }

    fn from_table(config: DbConfig, table: Table) -> Self {
        Self {
            config,
            table,
            rerankers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        self.table.name()
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Underlying row store.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Append snippets; returns how many rows were written.
    pub fn add_snippets<I>(&self, snippets: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Borrow<Snippet>,
    {
        let records: Vec<Record> = snippets
            .into_iter()
            .map(|s| s.borrow().to_record())
            .collect();
        self.table.add(&records)
    }

    pub fn add_snippet(&self, snippet: &Snippet) -> Result<usize> {
        self.add_snippets(std::iter::once(snippet))
    }

    /// Build the full-text index over `text`.
    ///
    /// An existing index is an error unless `replace` is set.
    pub fn create_index(&self, replace: bool) -> Result<()> {
        self.table.create_fts_index(TEXT_COLUMN, replace)
    }

    pub fn has_index(&self) -> bool {
        self.table.has_fts_index()
    }

    pub fn use_rerankers<I>(&self, rerankers: I)
    where
        I: IntoIterator<Item = Arc<dyn Reranker>>,
    {
        self.rerankers_mut().extend(rerankers);
    }

    pub fn use_reranker(&self, reranker: Arc<dyn Reranker>) {
        self.rerankers_mut().push(reranker);
    }

    /// Names of the registered rerankers, in application order.
    pub fn rerankers(&self) -> Vec<String> {
        self.rerankers_mut()
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResults> {
        let mut hybrid = self.table.search(query).limit(options.limit);

        if let Some(language) = &options.language {
            hybrid = hybrid.where_eq(LANGUAGE_COLUMN, language.clone());
        }
        if options.use_rerankers {
            let rerankers = self.rerankers_mut().clone();
            for reranker in rerankers {
                hybrid = hybrid.rerank(reranker);
            }
        }

        hybrid.execute()
    }

    pub fn count_rows(&self) -> Result<u64> {
        self.table.count_rows()
    }

    fn rerankers_mut(&self) -> MutexGuard<'_, Vec<Arc<dyn Reranker>>> {
        self.rerankers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for SnippetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnippetTable")
            .field("name", &self.name())
            .field("config", &self.config)
            .field("rerankers", &self.rerankers())
            .finish()
    }
}
