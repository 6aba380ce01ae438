// SPDX-License-Identifier: MIT OR Apache-2.0

//! snippets - Local code snippet store
//!
//! Stores language-tagged snippets with local embeddings and retrieves them
//! with hybrid vector + BM25 search.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing with SNIPPETS_LOG env var (e.g., SNIPPETS_LOG=debug snippets search "query")
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("SNIPPETS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "snippets", &mut std::io::stdout());
        return Ok(());
    }

    let ctx = commands::Session::new(cli.db, cli.table, cli.format);

    match cli.command {
        Commands::Add { paths, exclude } => {
            commands::add(&ctx, &paths, exclude)?;
        }
        Commands::Index { replace } => {
            commands::index(&ctx, replace)?;
        }
        Commands::Search {
            query,
            language,
            limit,
            no_rerank,
        } => {
            commands::search(&ctx, &query, language.as_deref(), limit, no_rerank)?;
        }
        Commands::Ask {
            query,
            language,
            limit,
        } => {
            commands::ask(&ctx, &query, language.as_deref(), limit)?;
        }
        Commands::Tables => {
            commands::tables(&ctx)?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
