// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding configuration used as the key for schemas and tables.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::embedding::{
    EmbeddingFunction, RegistryEntry, DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_NAME, REGISTRY,
};
use crate::errors::{Error, Result};

/// Registry entry used by [`DbConfig::sentence_transformers`].
pub const SENTENCE_TRANSFORMERS: &str = "sentence-transformers";

/// A registry entry together with a model instance it created.
///
/// Immutable once built. Two configs are equal when they name the same
/// registry, model and vector width, so a config can key a map.
#[derive(Clone)]
pub struct DbConfig {
    registry: RegistryEntry,
    model: Arc<EmbeddingFunction>,
}

impl DbConfig {
    /// Pair a registry entry with a model.
    ///
    /// Fails with a type error if the model was not created by `registry`.
    pub fn new(registry: RegistryEntry, model: Arc<EmbeddingFunction>) -> Result<Self> {
        if model.registry() != registry.name() {
            return Err(Error::type_mismatch(
                format!("a model created by '{}'", registry.name()),
                format!("a model created by '{}'", model.registry()),
            ));
        }
        Ok(Self { registry, model })
    }

    /// Look up `registry` and create `model` with it.
    pub fn from_names(registry: &str, model: &str, dimension: Option<usize>) -> Result<Self> {
        let entry = REGISTRY.get(registry)?;
        let model = entry.create_with_dimension(model, dimension)?;
        Self::new(entry, model)
    }

    /// `sentence-transformers` with `BAAI/bge-small-en-v1.5` (384 dimensions).
    ///
    /// Loads the model, downloading it on first use.
    pub fn sentence_transformers() -> Result<Self> {
        Self::from_names(
            SENTENCE_TRANSFORMERS,
            DEFAULT_MODEL_NAME,
            Some(DEFAULT_EMBEDDING_DIM),
        )
    }

    /// Zero-vector embeddings of width `dimension`, for tests and offline use.
    pub fn dummy(dimension: usize) -> Result<Self> {
        Self::from_names("dummy", "dummy", Some(dimension))
    }

    pub fn registry(&self) -> &RegistryEntry {
        &self.registry
    }

    pub fn model(&self) -> &Arc<EmbeddingFunction> {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    fn key(&self) -> (&str, &str, usize) {
        (self.registry.name(), self.model.model(), self.model.dimension())
    }
}

impl PartialEq for DbConfig {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DbConfig {}

impl Hash for DbConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("registry", &self.registry.name())
            .field("model", &self.model.model())
            .field("dimension", &self.model.dimension())
            .finish()
    }
}

impl fmt::Display for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({} dims)",
            self.registry.name(),
            self.model.model(),
            self.model.dimension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equal_configs_hash_alike() {
        let a = DbConfig::dummy(8).unwrap();
        let b = DbConfig::dummy(8).unwrap();
        let c = DbConfig::dummy(16).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<DbConfig> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_model_must_come_from_registry() {
        let dummy_model = REGISTRY.get("dummy").unwrap().create("dummy").unwrap();
        let other = REGISTRY.get("fastembed").unwrap();

        let err = DbConfig::new(other, dummy_model).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_display() {
        let config = DbConfig::dummy(4).unwrap();
        assert_eq!(config.to_string(), "dummy/dummy (4 dims)");
        assert_eq!(config.dimension(), 4);
    }
}
