// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snippet schema construction.

use std::collections::HashMap;

use super::config::DbConfig;
use crate::db::{Field, Schema};
use crate::errors::{Error, Result};
use crate::snippet::{FILENAME_COLUMN, LANGUAGE_COLUMN, TEXT_COLUMN, VECTOR_COLUMN};

/// Builds snippet schemas and remembers the ones registered with it.
#[derive(Debug, Default)]
pub struct SchemaFactory {
    schemas: HashMap<DbConfig, Schema>,
}

impl SchemaFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for `config`: `text` (source), `vector`, `language`, `filename`.
    ///
    /// Depends only on the config; equal configs give equal schemas.
    pub fn make_schema(config: &DbConfig) -> Result<Schema> {
        let model = config.model();
        Schema::new(
            vec![
                model.source_field(TEXT_COLUMN),
                model.vector_field(VECTOR_COLUMN),
                Field::string(LANGUAGE_COLUMN),
                Field::string(FILENAME_COLUMN),
            ],
            model.clone(),
        )
    }

    /// Build and remember the schema for `config`. Registering twice is a no-op.
    pub fn register(&mut self, config: &DbConfig) -> Result<()> {
        if !self.schemas.contains_key(config) {
            let schema = Self::make_schema(config)?;
            tracing::debug!(config = %config, "registered schema");
            self.schemas.insert(config.clone(), schema);
        }
        Ok(())
    }

    pub fn get_schema(&self, config: &DbConfig) -> Result<&Schema> {
        self.schemas
            .get(config)
            .ok_or_else(|| Error::UnregisteredConfig(config.to_string()))
    }

    pub fn is_registered(&self, config: &DbConfig) -> bool {
        self.schemas.contains_key(config)
    }

    pub fn configs(&self) -> impl Iterator<Item = &DbConfig> {
        self.schemas.keys()
    }
}
