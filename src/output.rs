// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use colored::Colorize;

use crate::db::{ResultRow, SearchResults};
use crate::snippet::{FILENAME_COLUMN, LANGUAGE_COLUMN, TEXT_COLUMN};

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize file path (cyan)
pub fn colorize_path(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize relevance score (yellow)
pub fn colorize_score(score: f32, use_color: bool) -> String {
    let text = format!("{:.3}", score);
    if use_color {
        text.yellow().to_string()
    } else {
        text
    }
}

/// Colorize language name (green)
pub fn colorize_language(text: &str, use_color: bool) -> String {
    if use_color {
        text.green().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize snippet body (dimmed)
pub fn colorize_body(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Header line for one result: `score  language  filename`
pub fn format_row_header(row: &ResultRow, use_color: bool) -> String {
    let mut header = format!(
        "{}  {}",
        colorize_score(row.relevance, use_color),
        colorize_language(row.get(LANGUAGE_COLUMN).unwrap_or(""), use_color)
    );
    if let Some(filename) = row.get(FILENAME_COLUMN).filter(|f| !f.is_empty()) {
        header.push_str("  ");
        header.push_str(&colorize_path(filename, use_color));
    }
    header
}

/// Human-readable rendering of a result set.
pub fn format_results(results: &SearchResults, use_color: bool) -> String {
    let mut out = String::new();
    for row in results {
        out.push_str(&format_row_header(row, use_color));
        out.push('\n');
        for line in row.get(TEXT_COLUMN).unwrap_or("").lines() {
            out.push_str("    ");
            out.push_str(&colorize_body(line, use_color));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
