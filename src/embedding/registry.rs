// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named embedding registry.
//!
//! A registry entry knows how to build embedding functions for the models it
//! supports. `sentence-transformers` and `fastembed` load local models through
//! fastembed; `dummy` produces zero vectors of any width and is meant for tests
//! and offline use.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::provider::{
    resolve_model, DummyProvider, EmbeddingProvider, EmbeddingProviderConfig, FastEmbedder,
    DEFAULT_EMBEDDING_DIM,
};
use crate::db::schema::{Field, FieldRole};
use crate::errors::{Error, Result};

/// How a registry entry produces vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    FastEmbed,
    Dummy,
}

/// A named way of creating embedding functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryEntry {
    name: &'static str,
    kind: ProviderKind,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Create an embedding function for `model` with the model's native width.
    pub fn create(&self, model: &str) -> Result<Arc<EmbeddingFunction>> {
        self.create_with_dimension(model, None)
    }

    /// Create an embedding function, checking (or for `dummy`, choosing) its width.
    pub fn create_with_dimension(
        &self,
        model: &str,
        dimension: Option<usize>,
    ) -> Result<Arc<EmbeddingFunction>> {
        let provider: Box<dyn EmbeddingProvider> = match self.kind {
            ProviderKind::FastEmbed => {
                let (_, native) = resolve_model(model).map_err(|_| Error::UnsupportedModel {
                    registry: self.name.to_string(),
                    model: model.to_string(),
                })?;
                if let Some(requested) = dimension.filter(|d| *d != native) {
                    return Err(Error::InvalidDimension {
                        expected: native,
                        actual: requested,
                    });
                }
                let config = EmbeddingProviderConfig::for_model(model)?;
                Box::new(FastEmbedder::new(config)?)
            }
            ProviderKind::Dummy => Box::new(DummyProvider::new(
                model,
                dimension.unwrap_or(DEFAULT_EMBEDDING_DIM),
            )),
        };

        Ok(Arc::new(EmbeddingFunction::new(self.name, model, provider)))
    }

    /// Wrap an already constructed provider as an embedding function of this entry.
    pub fn from_provider(&self, provider: Box<dyn EmbeddingProvider>) -> Arc<EmbeddingFunction> {
        let model = provider.model_id().to_string();
        Arc::new(EmbeddingFunction::new(self.name, &model, provider))
    }
}

/// Lookup table of registry entries by name.
pub struct EmbeddingRegistry {
    entries: BTreeMap<&'static str, RegistryEntry>,
}

impl Default for EmbeddingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingRegistry {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();

        for (name, kind) in [
            ("sentence-transformers", ProviderKind::FastEmbed),
            ("fastembed", ProviderKind::FastEmbed),
            ("dummy", ProviderKind::Dummy),
        ] {
            entries.insert(name, RegistryEntry { name, kind });
        }

        Self { entries }
    }

    /// Get an entry by name
    pub fn get(&self, name: &str) -> Result<RegistryEntry> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownRegistry(name.to_string()))
    }

    /// List all entry names
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().copied().collect()
    }
}

/// Global embedding registry
pub static REGISTRY: Lazy<EmbeddingRegistry> = Lazy::new(EmbeddingRegistry::new);

/// Shorthand for `REGISTRY.get(name)`.
pub fn get_registry_entry(name: &str) -> Result<RegistryEntry> {
    REGISTRY.get(name)
}

/// A concrete embedding model instance.
///
/// Exposes the `source_field` / `vector_field` binding points used when
/// declaring a schema, and computes vectors for inserted rows and queries.
pub struct EmbeddingFunction {
    registry: String,
    model: String,
    dimension: usize,
    provider: Mutex<Box<dyn EmbeddingProvider>>,
}

impl EmbeddingFunction {
    fn new(registry: &str, model: &str, provider: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            registry: registry.to_string(),
            model: model.to_string(),
            dimension: provider.dimension(),
            provider: Mutex::new(provider),
        }
    }

    /// Name of the registry entry that created this function
    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// A string column whose values are embedded.
    pub fn source_field(&self, name: &str) -> Field {
        Field::string(name).with_role(FieldRole::Source)
    }

    /// A vector column receiving the embeddings.
    pub fn vector_field(&self, name: &str) -> Field {
        Field::vector(name, self.dimension).with_role(FieldRole::Embedding)
    }

    /// Embed a batch of texts, checking the output width.
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut provider = self
            .provider
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let vectors = provider.embed_texts(texts)?;

        if vectors.len() != texts.len() {
            return Err(Error::Embedding(anyhow::anyhow!(
                "provider returned {} embeddings for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::InvalidDimension {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        Ok(vectors)
    }

    /// Embed a single query string.
    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(&[query.to_string()])?
            .pop()
            .ok_or_else(|| Error::Embedding(anyhow::anyhow!("No embedding returned")))
    }
}

impl fmt::Debug for EmbeddingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingFunction")
            .field("registry", &self.registry)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish()
    }
}
