//! In-memory vector storage and search.
//!
//! Records live in a map keyed by id behind a `tokio::sync::RwLock`; search is
//! a linear cosine scan. Used for `storage_mode: memory` and in tests.

use super::schema::CollectionSchema;
use super::store::{cosine_similarity, rank, UpsertReport, VectorStore};
use super::types::{IndexRecord, RetrievalResult};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// An in-memory vector store for record embeddings.
///
/// Upserts replace by id, so the same guarantees as the persistent stores hold.
pub struct InMemoryStore {
    schema: RwLock<CollectionSchema>,
    records: RwLock<BTreeMap<String, IndexRecord>>,
}

impl InMemoryStore {
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema: RwLock::new(schema),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the stored record with this id, if any.
    pub async fn get(&self, id: &str) -> Option<IndexRecord> {
        self.records.read().await.get(id).cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create_collection(&self, schema: &CollectionSchema, drop_existing: bool) -> Result<()> {
        if drop_existing {
            self.records.write().await.clear();
        }
        *self.schema.write().await = schema.clone();
        Ok(())
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<UpsertReport> {
        let dimension = self.schema.read().await.dimension();
        if let Some(dimension) = dimension {
            if let Some(bad) = records.iter().find(|r| r.values.len() != dimension) {
                bail!(
                    "record {} has {} dimensions, collection expects {}",
                    bad.id,
                    bad.values.len(),
                    dimension
                );
            }
        }

        let mut stored = self.records.write().await;
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        for record in records {
            stored.insert(record.id.clone(), record);
        }

        Ok(UpsertReport {
            count: ids.len(),
            ids,
        })
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let stored = self.records.read().await;
        let scored = stored
            .values()
            .map(|record| RetrievalResult {
                id: record.id.clone(),
                score: cosine_similarity(&record.values, query_embedding),
                metadata: record.metadata.clone(),
            })
            .collect();

        Ok(rank(scored, top_k))
    }

    async fn export_all(&self) -> Result<Vec<IndexRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }

    async fn build_index(&self) -> Result<bool> {
        Ok(false)
    }
}
