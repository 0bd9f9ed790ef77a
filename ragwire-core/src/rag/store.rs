//! Vector store abstraction and factory.
//!
//! This module provides a unified interface for the vector database backends.

use super::lancedb_store::LanceDbStore;
use super::memory_store::InMemoryStore;
use super::qdrant_store::QdrantStore;
use super::schema::CollectionSchema;
use super::types::{IndexRecord, RetrievalResult};
use crate::config::{StorageConfig, StorageMode};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// What a store reports back after an upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertReport {
    pub count: usize,
    /// Primary keys written, in input order
    pub ids: Vec<String>,
}

/// Unified interface for vector database operations.
///
/// Implementations handle record storage, similarity search and bulk export
/// across backends (Qdrant over gRPC, embedded LanceDB, in-memory).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Declares the collection. Creates it when missing; an existing one is
    /// kept unless `drop_existing` is set.
    async fn create_collection(&self, schema: &CollectionSchema, drop_existing: bool) -> Result<()>;

    /// Inserts or replaces records by id.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<UpsertReport>;

    /// Searches for the most similar records using cosine similarity.
    ///
    /// # Returns
    ///
    /// At most `top_k` results, sorted by descending similarity score.
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>>;

    /// Reads every record, vectors included.
    async fn export_all(&self) -> Result<Vec<IndexRecord>>;

    /// Returns the total number of records in the collection.
    async fn count(&self) -> Result<usize>;

    /// Builds the declared similarity index over the current contents.
    ///
    /// Returns `false` when the backend skipped it (self-managed index, or too
    /// few rows to train one).
    async fn build_index(&self) -> Result<bool>;

    /// Releases the connection. The handle must not be used afterwards.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens the configured store and makes sure its collection exists.
///
/// - `Grpc` mode connects to a Qdrant server
/// - `Embedded` mode opens a LanceDB dataset on disk
/// - `Memory` mode keeps everything in process
pub async fn create_vector_store(
    storage_config: &StorageConfig,
    api_key: Option<String>,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    let schema = CollectionSchema::standard(dimension, storage_config.index);

    match &storage_config.storage_mode {
        StorageMode::Grpc { url } => {
            let store = QdrantStore::connect(url, api_key, &storage_config.collection_name, schema).await?;
            Ok(Arc::new(store))
        }
        StorageMode::Embedded { path } => {
            let store = LanceDbStore::open(path, &storage_config.collection_name, schema).await?;
            Ok(Arc::new(store))
        }
        StorageMode::Memory => Ok(Arc::new(InMemoryStore::new(schema))),
    }
}

/// Cosine similarity of two vectors; 0.0 when either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sorts hits best-first and keeps at most `top_k`.
pub fn rank(mut results: Vec<RetrievalResult>, top_k: usize) -> Vec<RetrievalResult> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::RecordMetadata;

    fn hit(id: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            id: id.to_string(),
            score,
            metadata: RecordMetadata::default(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let ranked = rank(vec![hit("a", 0.1), hit("b", 0.9), hit("c", 0.5), hit("d", 0.9)], 3);
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c"]);
    }
}
