//! Retrieval Augmented Generation (RAG) pipeline.
//!
//! This module implements the three stages between the embedding model, the
//! vector database and the inference endpoint.
//!
//! # Architecture
//!
//! - [`chunker`]: splits document text into overlapping, boundary-aware chunks
//! - [`embedder`]: turns text into fixed-length vectors
//! - [`indexer`]: embeds chunks and upserts them in batches
//! - [`retriever`]: embeds a query, searches, and composes the grounded prompt
//! - [`migrate`]: exports a store to files and imports them into another
//! - [`store`]: the [`VectorStore`] trait with Qdrant, LanceDB and in-memory
//!   backends
//!
//! # How It Works
//!
//! 1. **Indexing Phase**:
//!    - Documents are split into chunks (default: 1000 characters with 200 overlap)
//!    - Each chunk is converted to a vector embedding, one at a time
//!    - Records are upserted by `{document_id}_chunk_{i}`, so re-uploads replace
//!
//! 2. **Retrieval Phase**:
//!    - The query is embedded
//!    - The store returns the top-k most similar chunks
//!    - Their texts are spliced into the prompt sent to the model

pub mod chunker;
pub mod embedder;
pub mod indexer;
pub mod lancedb_store;
pub mod memory_store;
pub mod migrate;
pub mod qdrant_store;
pub mod retriever;
pub mod schema;
pub mod store;
mod types;

pub use chunker::{Chunker, ChunkerError};
pub use embedder::{Embedder, EmbedderError};
pub use indexer::{Indexer, UploadSummary};
pub use memory_store::InMemoryStore;
pub use migrate::{ExportSummary, MigrationOptions, MigrationReport};
pub use retriever::{compose_prompt, Retriever};
pub use schema::{CollectionSchema, IndexSpec, IndexType, Metric, SchemaError};
pub use store::{create_vector_store, UpsertReport, VectorStore};
pub use types::{
    vector_id, Chunk, Document, ExportRecord, IndexRecord, RecordMetadata, RetrievalResult, UNKNOWN_SOURCE,
    UNTITLED,
};

use crate::config::{Config, ConfigError};
use crate::provider::{EmbeddingProvider, ProviderError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Vector store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    #[error("Vector store error: {0:#}")]
    Store(anyhow::Error),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("Inference error: {0}")]
    Inference(#[from] ProviderError),

    #[error("Export file {}: {message}", path.display())]
    Export { path: PathBuf, message: String },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ChunkerError> for RagError {
    fn from(e: ChunkerError) -> Self {
        RagError::Config(ConfigError::Invalid(e.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

/// The assembled pipeline: one embedder and one store handle shared by the
/// indexer and the retriever.
///
/// Cheap to clone; every component is reference counted.
#[derive(Clone)]
pub struct RagEngine {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    indexer: Indexer,
    retriever: Retriever,
    batch_size: usize,
}

impl RagEngine {
    /// Opens the configured vector store and builds the pipeline around it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ragwire_core::{Config, rag::RagEngine, provider::OllamaProvider};
    /// # use std::sync::Arc;
    /// # async fn example() {
    /// let config = Config::default();
    /// let embeddings = Arc::new(OllamaProvider::new(&config.embedding));
    /// let engine = RagEngine::open(&config, embeddings).await.unwrap();
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// [`RagError::StoreUnavailable`] when the store cannot be reached.
    pub async fn open(config: &Config, embedding_provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let embedder = Embedder::new(embedding_provider);
        let store = create_vector_store(&config.storage, config.store_api_key(), embedder.dimensions())
            .await
            .map_err(RagError::StoreUnavailable)?;
        info!(backend = store.backend(), collection = %config.storage.collection_name, "Vector store ready");

        Self::with_store(config, embedder, store)
    }

    /// Builds the pipeline around an already opened store.
    pub fn with_store(config: &Config, embedder: Embedder, store: Arc<dyn VectorStore>) -> Result<Self> {
        let chunker = Chunker::from_config(&config.rag)?;
        let indexer = Indexer::new(chunker, embedder.clone(), store.clone(), config.rag.batch_size);
        let retriever = Retriever::new(embedder.clone(), store.clone(), config.rag.top_k);

        Ok(Self {
            embedder,
            store,
            indexer,
            retriever,
            batch_size: config.rag.batch_size,
        })
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Chunks, embeds and uploads documents.
    pub async fn upload(&self, documents: &[Document]) -> Result<UploadSummary> {
        self.indexer.upload(documents).await
    }

    /// Uploads files; directories are walked recursively.
    pub async fn upload_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<UploadSummary> {
        self.indexer.upload_paths(paths).await
    }

    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        self.retriever.retrieve(query, top_k).await
    }

    /// Writes the whole store to `path` (JSON) and its `.bin` sibling.
    pub async fn export(&self, path: &Path) -> Result<Option<(migrate::ExportFiles, ExportSummary)>> {
        migrate::export_to_file(self.store.as_ref(), path).await
    }

    /// Loads an export file into this engine's store under the standard schema.
    pub async fn import(&self, path: &Path, schema: &CollectionSchema, drop_existing: bool) -> Result<MigrationReport> {
        let options = MigrationOptions {
            drop_existing,
            batch_size: self.batch_size,
        };
        migrate::migrate_from_file(self.store.as_ref(), schema, path, options).await
    }

    /// Number of records in the store.
    pub async fn count(&self) -> Result<usize> {
        self.store.count().await.map_err(RagError::Store)
    }

    /// Releases the store connection.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await.map_err(RagError::Store)
    }
}
