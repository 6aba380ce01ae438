// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for snippets
//!
//! Loads configuration from .snippetsrc.toml in the current directory or
//! ~/.config/snippets/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::db::{DEFAULT_LIMIT, DEFAULT_URI};
use crate::embedding::DEFAULT_MODEL_NAME;
use crate::errors::Result;
use crate::rerankers::{
    reranker_from_name, Reranker, RrfReranker, DEFAULT_RRF_K, DEFAULT_VECTOR_WEIGHT,
};
use crate::store::config::SENTENCE_TRANSFORMERS;
use crate::store::DbConfig;

/// Name of the per-directory configuration file.
pub const CONFIG_FILE: &str = ".snippetsrc.toml";

/// Default table name.
pub const DEFAULT_TABLE: &str = "snippets";

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOutputFormat {
    #[default]
    Text,
    Json,
}

/// Database location
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding the tables
    pub uri: Option<PathBuf>,
    /// Table snippets are stored in
    pub table: Option<String>,
}

impl DatabaseConfig {
    /// Get database uri (defaults to ".snippet-db")
    pub fn uri(&self) -> PathBuf {
        self.uri.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_URI))
    }

    /// Get table name (defaults to "snippets")
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(DEFAULT_TABLE)
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Registry entry (sentence-transformers, fastembed, dummy)
    pub registry: Option<String>,
    /// Model identifier understood by the registry entry
    pub model: Option<String>,
    /// Expected vector width; required for `dummy`
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    /// Get registry entry (defaults to "sentence-transformers")
    pub fn registry(&self) -> &str {
        self.registry.as_deref().unwrap_or(SENTENCE_TRANSFORMERS)
    }

    /// Get model identifier (defaults to "BAAI/bge-small-en-v1.5")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL_NAME)
    }

    /// Build the configured [`DbConfig`], loading the model.
    pub fn db_config(&self) -> Result<DbConfig> {
        DbConfig::from_names(self.registry(), self.model(), self.dimension)
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Rerankers applied after the default fusion, in order (linear, rrf)
    pub rerankers: Vec<String>,
    /// Vector weight for the linear reranker (0.0-1.0)
    pub linear_weight: Option<f32>,
    /// Constant for the rrf reranker
    pub rrf_k: Option<f32>,
}

impl SearchConfig {
    /// Get result limit (defaults to 5)
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// Get linear reranker weight (defaults to 0.3)
    pub fn linear_weight(&self) -> f32 {
        self.linear_weight.unwrap_or(DEFAULT_VECTOR_WEIGHT)
    }

    /// Get rrf constant (defaults to 60, negative values clamp to 0)
    pub fn rrf_k(&self) -> f32 {
        self.rrf_k
            .map(|k| RrfReranker::new(k).k())
            .unwrap_or(DEFAULT_RRF_K)
    }

    /// Instantiate the configured rerankers.
    pub fn rerankers(&self) -> Result<Vec<Arc<dyn Reranker>>> {
        self.rerankers
            .iter()
            .map(|name| reranker_from_name(name, self.linear_weight(), self.rrf_k()))
            .collect()
    }
}

/// File scanning configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Paths/patterns to skip when adding directories
    pub exclude_paths: Vec<String>,
}

impl IndexConfig {
    /// Get exclude paths
    pub fn exclude_paths(&self) -> &[String] {
        &self.exclude_paths
    }
}

/// Configuration loaded from .snippetsrc.toml or ~/.config/snippets/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default output format (text or json)
    pub default_format: Option<ConfigOutputFormat>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .snippetsrc.toml in current directory
    /// 2. ~/.config/snippets/config.toml
    pub fn load() -> Self {
        Self::load_for_dir(Path::new("."))
    }

    /// Same as [`load`](Self::load), looking for the local file in `dir`.
    pub fn load_for_dir(dir: &Path) -> Self {
        if let Some(config) = Self::load_from_path(&dir.join(CONFIG_FILE)) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("snippets").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn output_format(&self) -> ConfigOutputFormat {
        self.default_format.unwrap_or_default()
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.database
    }

    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    pub fn index(&self) -> &IndexConfig {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database().uri(), PathBuf::from(".snippet-db"));
        assert_eq!(config.database().table(), "snippets");
        assert_eq!(config.embeddings().registry(), "sentence-transformers");
        assert_eq!(config.embeddings().model(), "BAAI/bge-small-en-v1.5");
        assert_eq!(config.search().limit(), 5);
        assert_eq!(config.output_format(), ConfigOutputFormat::Text);
        assert!(config.search().rerankers().unwrap().is_empty());
    }

    #[test]
    fn test_parse_sections() {
        let config: Config = toml::from_str(
            r#"
            default_format = "json"

            [database]
            uri = "/tmp/snippets"
            table = "code"

            [embeddings]
            registry = "dummy"
            model = "dummy"
            dimension = 8

            [search]
            limit = 3
            rerankers = ["rrf", "linear"]
            linear_weight = 0.5

            [index]
            exclude_paths = ["vendor"]
            "#,
        )
        .unwrap();

        assert_eq!(config.output_format(), ConfigOutputFormat::Json);
        assert_eq!(config.database().uri(), PathBuf::from("/tmp/snippets"));
        assert_eq!(config.database().table(), "code");
        assert_eq!(config.search().limit(), 3);
        assert_eq!(config.search().rrf_k(), 60.0);
        assert_eq!(config.index().exclude_paths(), &["vendor".to_string()]);

        let names: Vec<String> = config
            .search()
            .rerankers()
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["rrf", "linear"]);

        let db_config = config.embeddings().db_config().unwrap();
        assert_eq!(db_config.dimension(), 8);
    }

    #[test]
    fn test_negative_rrf_k_is_clamped() {
        let config: Config = toml::from_str(
            r#"
            [search]
            rerankers = ["rrf"]
            rrf_k = -1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.search().rrf_k(), 0.0);
        assert_eq!(config.search().rerankers().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_reranker() {
        let config: Config = toml::from_str("[search]\nrerankers = [\"cohere\"]").unwrap();
        assert!(matches!(
            config.search().rerankers(),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_load_for_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[database]\ntable = \"local\"\n",
        )
        .unwrap();
        assert_eq!(Config::load_for_dir(dir.path()).database().table(), "local");
    }

    #[test]
    fn test_invalid_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[search\nlimit = ").unwrap();
        assert!(Config::load_from_path(&path).is_none());
    }
}
