// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text rendering of search results.

use std::fmt::Write;
use std::sync::Arc;

use super::table::{SearchOptions, SnippetTable};
use crate::db::SearchResults;
use crate::errors::Result;
use crate::snippet::{LANGUAGE_COLUMN, TEXT_COLUMN};

const SEPARATOR_WIDTH: usize = 40;

pub struct SnippetGenerator {
    table: Arc<SnippetTable>,
}

impl SnippetGenerator {
    pub fn new(table: Arc<SnippetTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<SnippetTable> {
        &self.table
    }

    /// Search and render the hits under a `Query:` header.
    pub fn generate_response(
        &self,
        query: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<String> {
        let results = self.search_snippets(query, language, limit)?;
        Ok(format_response(query, &results))
    }

    pub fn search_snippets(
        &self,
        query: &str,
        language: Option<&str>,
        limit: usize,
    ) -> Result<SearchResults> {
        let mut options = SearchOptions::default().with_limit(limit);
        if let Some(language) = language {
            options = options.with_language(language);
        }
        self.table.search(query, &options)
    }
}

/// Render rows in result order.
pub fn format_response(query: &str, results: &SearchResults) -> String {
    let mut response = format!("Query: {}\n\nRelevant snippets:\n\n", query);
    let separator = "-".repeat(SEPARATOR_WIDTH);

    for row in results {
        let _ = write!(
            response,
            "Language: {}\nSnippet:\n{}\n\n{}\n\n",
            row.get(LANGUAGE_COLUMN).unwrap_or(""),
            row.get(TEXT_COLUMN).unwrap_or(""),
            separator
        );
    }

    response
}
