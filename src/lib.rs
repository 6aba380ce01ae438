// SPDX-License-Identifier: MIT OR Apache-2.0

//! snippet-db - Local store for language-tagged code snippets
//!
//! Snippets are embedded with a local sentence-embedding model, kept in a
//! SQLite-backed table and retrieved with hybrid (cosine + BM25) search.
//!
//! ```no_run
//! use snippet_db::languages::Language;
//! use snippet_db::snippet::Snippet;
//! use snippet_db::store::{DbConfig, DbConnection, SearchOptions};
//!
//! # fn main() -> snippet_db::errors::Result<()> {
//! let config = DbConfig::sentence_transformers()?;
//! let mut conn = DbConnection::from_uri(config.clone(), ".snippet-db")?;
//! let table = conn.get_or_create_table(&config, "snippets")?;
//!
//! table.add_snippet(&Snippet::new("print(1)", Language::Py))?;
//! table.create_index(true)?;
//!
//! let results = table.search("print", &SearchOptions::default())?;
//! assert_eq!(results.rows()[0].get("language"), Some("Python"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod embedding;
pub mod errors;
pub mod languages;
pub mod output;
pub mod rerankers;
pub mod scanner;
pub mod snippet;
pub mod store;
