// SPDX-License-Identifier: MIT OR Apache-2.0

//! Declarative table schemas.
//!
//! A schema is a list of fields plus the embedding function bound to its
//! source/vector pair. Only the field list and the embedding descriptor are
//! persisted; the function itself is re-bound when a table is opened.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::embedding::{EmbeddingFunction, REGISTRY};
use crate::errors::{Error, Result};

/// Column value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Utf8,
    Vector { dimension: usize },
}

/// What a column does with respect to the embedding function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    #[default]
    Plain,
    /// Values are fed to the embedding function
    Source,
    /// Values are produced by the embedding function
    Embedding,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub role: FieldRole,
}

impl Field {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Utf8,
            role: FieldRole::Plain,
        }
    }

    pub fn vector(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Vector { dimension },
            role: FieldRole::Plain,
        }
    }

    pub fn with_role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }
}

/// Identifies the embedding function a schema was declared with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingDescriptor {
    pub registry: String,
    pub model: String,
    pub dimension: usize,
}

/// Persisted form of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub fields: Vec<Field>,
    pub embedding: EmbeddingDescriptor,
}

/// Record shape of a table, bound to an embedding function.
#[derive(Clone)]
pub struct Schema {
    fields: Vec<Field>,
    embedding: Arc<EmbeddingFunction>,
}

impl Schema {
    /// Build a schema, requiring exactly one source and one embedding field.
    pub fn new(fields: Vec<Field>, embedding: Arc<EmbeddingFunction>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::SchemaMismatch(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
        }

        let sources: Vec<&Field> = fields.iter().filter(|f| f.role == FieldRole::Source).collect();
        let vectors: Vec<&Field> = fields
            .iter()
            .filter(|f| f.role == FieldRole::Embedding)
            .collect();

        match (sources.as_slice(), vectors.as_slice()) {
            ([source], [vector]) => {
                if source.kind != FieldKind::Utf8 {
                    return Err(Error::SchemaMismatch(format!(
                        "source field '{}' must be a string",
                        source.name
                    )));
                }
                match vector.kind {
                    FieldKind::Vector { dimension } if dimension == embedding.dimension() => {}
                    FieldKind::Vector { dimension } => {
                        return Err(Error::InvalidDimension {
                            expected: embedding.dimension(),
                            actual: dimension,
                        })
                    }
                    FieldKind::Utf8 => {
                        return Err(Error::SchemaMismatch(format!(
                            "embedding field '{}' must be a vector",
                            vector.name
                        )))
                    }
                }
            }
            _ => {
                return Err(Error::SchemaMismatch(format!(
                    "expected exactly one source and one embedding field, found {} and {}",
                    sources.len(),
                    vectors.len()
                )))
            }
        }

        Ok(Self { fields, embedding })
    }

    /// Rebuild a schema from its persisted form using the global registry.
    pub fn from_descriptor(descriptor: SchemaDescriptor) -> Result<Self> {
        let embedding = REGISTRY
            .get(&descriptor.embedding.registry)?
            .create_with_dimension(
                &descriptor.embedding.model,
                Some(descriptor.embedding.dimension),
            )?;
        Self::new(descriptor.fields, embedding)
    }

    pub fn descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor {
            fields: self.fields.clone(),
            embedding: EmbeddingDescriptor {
                registry: self.embedding.registry().to_string(),
                model: self.embedding.model().to_string(),
                dimension: self.embedding.dimension(),
            },
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn embedding(&self) -> &Arc<EmbeddingFunction> {
        &self.embedding
    }

    /// The column fed to the embedding function.
    pub fn source_field(&self) -> &Field {
        self.role_field(FieldRole::Source)
    }

    /// The column holding embeddings.
    pub fn vector_field(&self) -> &Field {
        self.role_field(FieldRole::Embedding)
    }

    pub fn vector_dimension(&self) -> usize {
        self.embedding.dimension()
    }

    /// All string columns, in declaration order.
    pub fn string_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Utf8)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    fn role_field(&self, role: FieldRole) -> &Field {
        // `new` guarantees exactly one field per role
        self.fields
            .iter()
            .find(|f| f.role == role)
            .unwrap_or(&self.fields[0])
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor() == other.descriptor()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field("embedding", &self.embedding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(dim: usize) -> Arc<EmbeddingFunction> {
        REGISTRY
            .get("dummy")
            .unwrap()
            .create_with_dimension("dummy", Some(dim))
            .unwrap()
    }

    fn snippet_fields(func: &EmbeddingFunction) -> Vec<Field> {
        vec![
            func.source_field("text"),
            func.vector_field("vector"),
            Field::string("language"),
        ]
    }

    #[test]
    fn test_schema_roles() {
        let func = dummy(4);
        let schema = Schema::new(snippet_fields(&func), func.clone()).unwrap();
        assert_eq!(schema.source_field().name, "text");
        assert_eq!(schema.vector_field().name, "vector");
        assert_eq!(schema.vector_dimension(), 4);
        assert_eq!(schema.column_names(), vec!["text", "vector", "language"]);
        assert_eq!(
            schema.string_fields().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["text", "language"]
        );
    }

    #[test]
    fn test_schema_requires_source_and_vector() {
        let func = dummy(4);
        let err = Schema::new(vec![Field::string("text")], func.clone()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));

        let fields = vec![
            func.source_field("text"),
            Field::vector("vector", 8).with_role(FieldRole::Embedding),
        ];
        let err = Schema::new(fields, func).unwrap_err();
        assert!(matches!(err, Error::InvalidDimension { expected: 4, actual: 8 }));
    }

    #[test]
    fn test_schema_rejects_duplicate_fields() {
        let func = dummy(4);
        let mut fields = snippet_fields(&func);
        fields.push(Field::string("language"));
        assert!(Schema::new(fields, func).is_err());
    }

    #[test]
    fn test_descriptor_round_trip() {
        let func = dummy(4);
        let schema = Schema::new(snippet_fields(&func), func).unwrap();
        let json = serde_json::to_string(&schema.descriptor()).unwrap();
        let descriptor: SchemaDescriptor = serde_json::from_str(&json).unwrap();
        let rebuilt = Schema::from_descriptor(descriptor).unwrap();
        assert_eq!(rebuilt, schema);
    }
}
