// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - turns snippet text into vectors for semantic search
//!
//! Providers do the actual inference; the registry names them and hands out
//! [`EmbeddingFunction`] instances that schemas bind to.

pub mod provider;
pub mod registry;

pub use provider::{
    DummyProvider, EmbeddingProvider, EmbeddingProviderConfig, FastEmbedder,
    DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_NAME,
};
pub use registry::{
    get_registry_entry, EmbeddingFunction, EmbeddingRegistry, ProviderKind, RegistryEntry,
    REGISTRY,
};
