// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// snippets - Store code snippets and find them again
///
/// Snippets are tagged with their language, embedded with a local
/// sentence-embedding model and retrieved with hybrid (vector + BM25) search.
#[derive(Parser, Debug)]
#[command(name = "snippets")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database directory (defaults to .snippet-db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Table to use (defaults to "snippets")
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Output format (text or json)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add files, or every supported file under a directory
    Add {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Paths/patterns to skip inside directories (repeatable)
        #[arg(short, long = "exclude")]
        exclude: Vec<String>,
    },

    /// Build the full-text index used for keyword ranking
    Index {
        /// Rebuild the index if it already exists
        #[arg(long)]
        replace: bool,
    },

    /// Hybrid search over stored snippets
    #[command(alias = "s")]
    Search {
        /// Search query (natural language or keywords)
        query: String,

        /// Only snippets in this language (name or extension, e.g. "Python" or "py")
        #[arg(short, long)]
        language: Option<String>,

        /// Maximum number of results
        #[arg(short = 'm', long = "limit")]
        limit: Option<usize>,

        /// Skip the rerankers configured in [search]
        #[arg(long)]
        no_rerank: bool,
    },

    /// Print the matching snippets as a plain-text answer
    Ask {
        /// Question or keywords
        query: String,

        /// Only snippets in this language
        #[arg(short, long)]
        language: Option<String>,

        /// Maximum number of snippets
        #[arg(short = 'm', long = "limit")]
        limit: Option<usize>,
    },

    /// List tables in the database
    Tables,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
