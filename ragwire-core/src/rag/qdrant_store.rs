//! Qdrant vector database storage implementation.
//!
//! Qdrant is schemaless: every record becomes a point whose payload carries the
//! metadata fields, with extra metadata flattened alongside them. Point ids must
//! be integers or UUIDs, so the record id is mapped to a UUID v5 and the
//! original id is kept in the payload under `id`.

use super::schema::CollectionSchema;
use super::store::{rank, UpsertReport, VectorStore};
use super::types::{IndexRecord, RecordMetadata, RetrievalResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, vectors_output::VectorsOptions, CountPointsBuilder, CreateCollectionBuilder, Distance,
        PointId, PointStruct, RetrievedPoint, ScrollPointsBuilder, SearchPointsBuilder,
        UpsertPointsBuilder, Value, VectorParamsBuilder,
    },
    Payload, Qdrant,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

const SCROLL_PAGE: u32 = 100;
const TYPED_KEYS: [&str; 6] = ["id", "text", "title", "source", "chunk_index", "total_chunks"];

/// Maps a record id onto a stable Qdrant point id.
pub fn point_id(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

/// Qdrant-based vector store.
///
/// Upserts replace points with the same id, and re-indexing a document
/// overwrites its previous chunks. [`close`](VectorStore::close) drops the
/// client; any later call fails.
pub struct QdrantStore {
    client: RwLock<Option<Arc<Qdrant>>>,
    url: String,
    collection_name: String,
}

impl QdrantStore {
    /// Connects to a Qdrant server and ensures the collection exists.
    ///
    /// # Arguments
    ///
    /// * `url` - gRPC endpoint, e.g. `http://localhost:6334`
    /// * `api_key` - Sent with every request when present
    /// * `collection_name` - Collection to use
    /// * `schema` - Supplies the vector dimension for a new collection
    pub async fn connect(
        url: &str,
        api_key: Option<String>,
        collection_name: &str,
        schema: CollectionSchema,
    ) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder.build().context("Failed to build Qdrant client")?;

        let store = Self {
            client: RwLock::new(Some(Arc::new(client))),
            url: url.to_string(),
            collection_name: collection_name.to_string(),
        };

        store
            .create_collection(&schema, false)
            .await
            .with_context(|| format!("Failed to connect to Qdrant at {}", url))?;
        info!(url, collection = collection_name, "Connected to Qdrant");

        Ok(store)
    }

    async fn client(&self) -> Result<Arc<Qdrant>> {
        self.client
            .read()
            .await
            .clone()
            .with_context(|| format!("Qdrant store at {} is closed", self.url))
    }

    fn to_point(record: IndexRecord) -> Result<PointStruct> {
        let mut payload = serde_json::Map::new();
        // Extra first so typed fields win on a name clash.
        for (key, value) in &record.metadata.extra {
            payload.insert(key.clone(), json!(value));
        }
        payload.insert("id".into(), json!(record.id));
        payload.insert("text".into(), json!(record.metadata.text));
        payload.insert("title".into(), json!(record.metadata.title));
        payload.insert("source".into(), json!(record.metadata.source));
        payload.insert("chunk_index".into(), json!(record.metadata.chunk_index));
        payload.insert("total_chunks".into(), json!(record.metadata.total_chunks));

        let payload = Payload::try_from(serde_json::Value::Object(payload))
            .with_context(|| format!("Failed to build payload for {}", record.id))?;

        Ok(PointStruct::new(point_id(&record.id), record.values, payload))
    }

    fn payload_text(value: &Value) -> Option<String> {
        value
            .as_str()
            .cloned()
            .or_else(|| value.as_integer().map(|n| n.to_string()))
            .or_else(|| value.as_double().map(|f| f.to_string()))
            .or_else(|| value.as_bool().map(|b| b.to_string()))
    }

    fn read_metadata(payload: &HashMap<String, Value>) -> RecordMetadata {
        let string = |key: &str| {
            payload
                .get(key)
                .and_then(|v| v.as_str())
                .cloned()
                .unwrap_or_default()
        };
        let integer = |key: &str, default: u64| {
            payload
                .get(key)
                .and_then(|v| {
                    v.as_integer()
                        .and_then(|n| u64::try_from(n).ok())
                        .or_else(|| v.as_double().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
                })
                .unwrap_or(default)
        };

        let extra: BTreeMap<String, String> = payload
            .iter()
            .filter(|(key, _)| !TYPED_KEYS.contains(&key.as_str()))
            .filter_map(|(key, value)| Self::payload_text(value).map(|v| (key.clone(), v)))
            .collect();

        RecordMetadata {
            text: string("text"),
            title: string("title"),
            source: string("source"),
            chunk_index: integer("chunk_index", 0),
            total_chunks: integer("total_chunks", 1),
            extra,
        }
    }

    fn record_id(payload: &HashMap<String, Value>, point: Option<&PointId>) -> String {
        payload
            .get("id")
            .and_then(|v| v.as_str())
            .cloned()
            .or_else(|| {
                point
                    .and_then(|p| p.point_id_options.as_ref())
                    .map(|options| match options {
                        PointIdOptions::Num(n) => n.to_string(),
                        PointIdOptions::Uuid(uuid) => uuid.clone(),
                    })
            })
            .unwrap_or_default()
    }

    #[allow(deprecated)]
    fn dense_vector(point: &RetrievedPoint) -> Option<Vec<f32>> {
        match point.vectors.as_ref()?.vectors_options.as_ref()? {
            VectorsOptions::Vector(vector) => Some(vector.data.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    async fn create_collection(&self, schema: &CollectionSchema, drop_existing: bool) -> Result<()> {
        let mut exists = self
            .client()
            .await?
            .collection_exists(&self.collection_name)
            .await
            .context("Failed to check collection")?;

        if exists && drop_existing {
            self.client()
                .await?
                .delete_collection(&self.collection_name)
                .await
                .context("Failed to delete collection")?;
            info!(collection = %self.collection_name, "Dropped existing collection");
            exists = false;
        }

        if !exists {
            let dimension = schema
                .dimension()
                .ok_or_else(|| anyhow!("schema has no vector field"))?;
            self.client()
                .await?
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
                )
                .await
                .context("Failed to create collection")?;
            info!(collection = %self.collection_name, dimension, "Created collection");
        }

        Ok(())
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<UpsertReport> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let points = records
            .into_iter()
            .map(Self::to_point)
            .collect::<Result<Vec<_>>>()?;

        self.client()
            .await?
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await
            .context("Failed to upsert points")?;

        debug!(collection = %self.collection_name, count = ids.len(), "Upserted points");
        Ok(UpsertReport {
            count: ids.len(),
            ids,
        })
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let response = self
            .client()
            .await?
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, query_embedding.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .context("Failed to search points")?;

        let results = response
            .result
            .into_iter()
            .map(|point| RetrievalResult {
                id: Self::record_id(&point.payload, point.id.as_ref()),
                score: point.score,
                metadata: Self::read_metadata(&point.payload),
            })
            .collect();

        Ok(rank(results, top_k))
    }

    async fn export_all(&self) -> Result<Vec<IndexRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection_name)
                .limit(SCROLL_PAGE)
                .with_payload(true)
                .with_vectors(true);

            if let Some(off) = offset {
                builder = builder.offset(off);
            }

            let page = self
                .client()
                .await?
                .scroll(builder)
                .await
                .context("Failed to scroll points")?;

            for point in &page.result {
                let values = Self::dense_vector(point).unwrap_or_default();
                records.push(IndexRecord {
                    id: Self::record_id(&point.payload, point.id.as_ref()),
                    values,
                    metadata: Self::read_metadata(&point.payload),
                });
            }

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!(collection = %self.collection_name, count = records.len(), "Scrolled all points");
        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client()
            .await?
            .count(CountPointsBuilder::new(&self.collection_name).exact(true))
            .await
            .context("Failed to count points")?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn build_index(&self) -> Result<bool> {
        info!(
            collection = %self.collection_name,
            "Qdrant maintains its HNSW index on write, nothing to build"
        );
        Ok(false)
    }

    async fn close(&self) -> Result<()> {
        if self.client.write().await.take().is_some() {
            info!(url = %self.url, "Released Qdrant client");
        }
        Ok(())
    }
}
