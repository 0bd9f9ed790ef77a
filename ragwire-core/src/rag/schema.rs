//! Collection schema and similarity index declarations.
//!
//! Stores with typed columns (LanceDB) build their table from this; the
//! schemaless store (Qdrant) only uses the vector field and the metric.
//! Migration validates every record against it before writing.

use super::types::IndexRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("record {id}: vector has {actual} dimensions, schema expects {expected}")]
    Dimension { id: String, expected: usize, actual: usize },

    #[error("record {id}: field '{field}' is {length} characters, limit is {max_length}")]
    TooLong { id: String, field: String, length: usize, max_length: usize },

    #[error("schema has no float vector field")]
    NoVectorField,
}

/// Column type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    VarChar { max_length: usize },
    Int64,
    FloatVector { dim: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            primary: false,
            description: description.into(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// Inverted file index over raw vectors
    #[default]
    IvfFlat,
    /// Inverted file index with product quantization
    IvfPq,
    /// No ANN index; exhaustive search
    Flat,
}

/// Similarity index declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    #[serde(default)]
    pub metric: Metric,
    #[serde(default)]
    pub index_type: IndexType,
    /// Number of IVF partitions
    #[serde(default = "default_nlist")]
    pub nlist: usize,
    /// Partitions probed per query
    #[serde(default = "default_nprobe")]
    pub nprobe: usize,
}

fn default_nlist() -> usize {
    1024
}

fn default_nprobe() -> usize {
    10
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self {
            metric: Metric::Cosine,
            index_type: IndexType::IvfFlat,
            nlist: default_nlist(),
            nprobe: default_nprobe(),
        }
    }
}

/// Name of the vector column in the standard schema.
pub const VECTOR_FIELD: &str = "vector";
/// Name of the column holding JSON-encoded extra metadata.
pub const EXTRA_FIELD: &str = "extra";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: Vec<FieldSchema>,
    /// Keep caller metadata that has no column of its own.
    pub dynamic_field: bool,
    pub index: IndexSpec,
    pub description: String,
}

impl CollectionSchema {
    /// The schema every store in this crate uses.
    pub fn standard(dim: usize, index: IndexSpec) -> Self {
        Self {
            fields: vec![
                FieldSchema::new("id", FieldKind::VarChar { max_length: 512 }, "Unique identifier for the vector")
                    .primary(),
                FieldSchema::new(VECTOR_FIELD, FieldKind::FloatVector { dim }, "Text embedding vector"),
                FieldSchema::new("text", FieldKind::VarChar { max_length: 65535 }, "Original text content"),
                FieldSchema::new("title", FieldKind::VarChar { max_length: 1024 }, "Document title"),
                FieldSchema::new("source", FieldKind::VarChar { max_length: 1024 }, "Document source"),
                FieldSchema::new("chunk_index", FieldKind::Int64, "Chunk index within document"),
                FieldSchema::new("total_chunks", FieldKind::Int64, "Total number of chunks in document"),
            ],
            dynamic_field: true,
            index,
            description: "RAG collection for document embeddings".to_string(),
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.fields.iter().find_map(|field| match field.kind {
            FieldKind::FloatVector { dim } => Some(dim),
            _ => None,
        })
    }

    pub fn primary_key(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.primary)
    }

    /// Checks vector length and varchar limits of one record.
    pub fn validate(&self, record: &IndexRecord) -> Result<(), SchemaError> {
        for field in &self.fields {
            match field.kind {
                FieldKind::FloatVector { dim } => {
                    if record.values.len() != dim {
                        return Err(SchemaError::Dimension {
                            id: record.id.clone(),
                            expected: dim,
                            actual: record.values.len(),
                        });
                    }
                }
                FieldKind::VarChar { max_length } => {
                    let length = record
                        .string_field(&field.name)
                        .map(|value| value.chars().count())
                        .unwrap_or(0);
                    if length > max_length {
                        return Err(SchemaError::TooLong {
                            id: record.id.clone(),
                            field: field.name.clone(),
                            length,
                            max_length,
                        });
                    }
                }
                FieldKind::Int64 => {}
            }
        }
        Ok(())
    }
}
