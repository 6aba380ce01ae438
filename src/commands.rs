// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations for the snippets binary

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snippet_db::config::{Config, ConfigOutputFormat};
use snippet_db::db::Database;
use snippet_db::languages::Language;
use snippet_db::output;
use snippet_db::scanner::SnippetScanner;
use snippet_db::snippet::Snippet;
use snippet_db::store::{DbConnection, SearchOptions, SnippetGenerator, SnippetTable};

use crate::cli::OutputFormat;

const ADD_BATCH_SIZE: usize = 64;

/// Settings shared by every subcommand
pub struct Session {
    config: Config,
    db: PathBuf,
    table: String,
    format: OutputFormat,
}

impl Session {
    pub fn new(db: Option<PathBuf>, table: Option<String>, format: Option<OutputFormat>) -> Self {
        let config = Config::load();
        let db = db.unwrap_or_else(|| config.database().uri());
        let table = table.unwrap_or_else(|| config.database().table().to_string());
        let format = format.unwrap_or(match config.output_format() {
            ConfigOutputFormat::Text => OutputFormat::Text,
            ConfigOutputFormat::Json => OutputFormat::Json,
        });
        Self {
            config,
            db,
            table,
            format,
        }
    }

    fn open_table(&self) -> Result<Arc<SnippetTable>> {
        let db_config = self
            .config
            .embeddings()
            .db_config()
            .context("Failed to load embedding model")?;
        let mut conn = DbConnection::from_uri(db_config.clone(), &self.db)
            .with_context(|| format!("Failed to open database at {}", self.db.display()))?;
        let table = conn
            .get_or_create_table(&db_config, &self.table)
            .with_context(|| format!("Failed to open table '{}'", self.table))?;
        Ok(table)
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

#[derive(Serialize)]
struct AddOutcome<'a> {
    table: &'a str,
    added: usize,
    rows: u64,
}

pub fn add(ctx: &Session, paths: &[PathBuf], exclude: Vec<String>) -> Result<()> {
    let snippets = collect_snippets(ctx, paths, exclude)?;
    let table = ctx.open_table()?;

    let pb = ProgressBar::new(snippets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} snippets | Embedding {msg}")
            .expect("valid progress bar template")
            .progress_chars("##."),
    );

    let mut added = 0;
    for batch in snippets.chunks(ADD_BATCH_SIZE) {
        if let Some(name) = batch
            .first()
            .and_then(|s| s.filename.as_deref())
            .and_then(Path::file_name)
        {
            pb.set_message(name.to_string_lossy().into_owned());
        }
        added += table.add_snippets(batch)?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();

    let rows = table.count_rows()?;
    if ctx.json() {
        let outcome = AddOutcome {
            table: table.name(),
            added,
            rows,
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!(
            "{} {} snippets to '{}' ({} rows)",
            "Added".green().bold(),
            added,
            table.name(),
            rows
        );
        if !table.has_index() {
            println!(
                "{}",
                "Run `snippets index` to enable keyword ranking.".dimmed()
            );
        }
    }
    Ok(())
}

/// Files are loaded in parallel; directories go through the scanner.
fn collect_snippets(ctx: &Session, paths: &[PathBuf], exclude: Vec<String>) -> Result<Vec<Snippet>> {
    let mut exclude = exclude;
    exclude.extend(ctx.config.index().exclude_paths().iter().cloned());

    let (dirs, files): (Vec<&PathBuf>, Vec<&PathBuf>) = paths.iter().partition(|p| p.is_dir());

    let mut snippets = files
        .par_iter()
        .progress_count(files.len() as u64)
        .map(|path| {
            Snippet::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    for dir in dirs {
        let scanner = SnippetScanner::new(dir)
            .skip_dir(&ctx.db)
            .exclude(exclude.iter().cloned());
        let found = scanner
            .scan()
            .with_context(|| format!("Failed to scan {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), files = found.len(), "scanned directory");
        snippets.extend(found);
    }

    Ok(snippets)
}

pub fn index(ctx: &Session, replace: bool) -> Result<()> {
    let table = ctx.open_table()?;
    table.create_index(replace)?;
    let rows = table.count_rows()?;

    if ctx.json() {
        println!(
            "{}",
            serde_json::json!({ "table": table.name(), "indexed": rows })
        );
    } else {
        println!(
            "{} full-text index for '{}' ({} rows)",
            "Built".green().bold(),
            table.name(),
            rows
        );
    }
    Ok(())
}

pub fn search(
    ctx: &Session,
    query: &str,
    language: Option<&str>,
    limit: Option<usize>,
    no_rerank: bool,
) -> Result<()> {
    let table = ctx.open_table()?;
    table.use_rerankers(ctx.config.search().rerankers()?);

    let mut options = SearchOptions::default()
        .with_limit(limit.unwrap_or_else(|| ctx.config.search().limit()))
        .with_rerankers(!no_rerank);
    if let Some(language) = language {
        options = options.with_language(resolve_language(language)?);
    }

    let results = table.search(query, &options)?;

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        eprintln!("No snippets matched '{}'", query);
    } else {
        print!("{}", output::format_results(&results, output::use_colors()));
    }
    Ok(())
}

pub fn ask(ctx: &Session, query: &str, language: Option<&str>, limit: Option<usize>) -> Result<()> {
    let table = ctx.open_table()?;
    table.use_rerankers(ctx.config.search().rerankers()?);

    let language = language.map(resolve_language).transpose()?;
    let limit = limit.unwrap_or_else(|| ctx.config.search().limit());
    let response = SnippetGenerator::new(table).generate_response(query, language.as_deref(), limit)?;

    if ctx.json() {
        println!(
            "{}",
            serde_json::json!({ "query": query, "response": response })
        );
    } else {
        print!("{}", response);
    }
    Ok(())
}

pub fn tables(ctx: &Session) -> Result<()> {
    let db = Database::connect(&ctx.db)
        .with_context(|| format!("Failed to open database at {}", ctx.db.display()))?;
    let names = db.table_names()?;

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}

/// Stored rows carry the display name, so map "py" to "Python".
fn resolve_language(value: &str) -> Result<String> {
    Ok(Language::from_user_input(value)?.display_name().to_string())
}
