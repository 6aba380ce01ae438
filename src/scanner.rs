// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory scanner using the ignore crate (same as ripgrep)

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::errors::Result;
use crate::languages::Language;
use crate::snippet::Snippet;

/// Walks a directory and loads every file with a recognized language.
pub struct SnippetScanner {
    root: PathBuf,
    skip: Vec<PathBuf>,
    exclude: Vec<String>,
}

impl SnippetScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
            skip: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Never descend into `dir` (e.g. the database directory).
    pub fn skip_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.skip
            .push(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    /// Skip entries whose name, or path relative to the root, starts with
    /// one of `patterns`.
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(patterns);
        self
    }

    /// Scan all files under the root, sorted by path
    pub fn scan(&self) -> Result<Vec<Snippet>> {
        if !self.root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            )
            .into());
        }

        let (tx, rx) = mpsc::channel();

        let root = self.root.clone();
        let skip = self.skip.clone();
        let exclude = self.exclude.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .filter_entry(move |entry| {
                let path = entry.path();
                if skip.iter().any(|s| path.starts_with(s)) {
                    return false;
                }
                if entry.file_name() == ".git" {
                    return false;
                }
                let name = entry.file_name().to_string_lossy();
                let relative = path.strip_prefix(&root).unwrap_or(path);
                !exclude
                    .iter()
                    .any(|p| name.as_ref() == p.as_str() || relative.starts_with(p))
            })
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();

            Box::new(move |entry| {
                if let Ok(entry) = entry {
                    let path = entry.path();

                    if path.is_file() && Language::from_extension(path).is_ok() {
                        match Snippet::from_file(path) {
                            Ok(snippet) => {
                                let _ = tx.send(snippet);
                            }
                            Err(err) => {
                                tracing::debug!(path = %path.display(), error = %err, "skipping file");
                            }
                        }
                    }
                }
                ignore::WalkState::Continue
            })
        });

        drop(tx);
        let mut snippets: Vec<Snippet> = rx.into_iter().collect();
        snippets.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(snippets)
    }
}
