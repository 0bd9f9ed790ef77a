//! Document indexing: chunk, embed, upsert.
//!
//! This module provides functionality to:
//! - Turn documents into [`IndexRecord`]s, one per chunk
//! - Upload records in fixed-size batches, logging and counting failed batches
//! - Collect text files from paths (directories are walked recursively)

use super::chunker::Chunker;
use super::embedder::Embedder;
use super::store::VectorStore;
use super::types::{Document, IndexRecord, RecordMetadata};
use super::{RagError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Default number of records per upsert call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Outcome of a batched upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub documents: usize,
    pub chunks: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Vectors the store acknowledged
    pub succeeded: usize,
    /// Vectors in batches that failed
    pub failed: usize,
}

impl UploadSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Upserts `records` in batches of `batch_size`, one batch at a time.
///
/// A failing batch is logged and skipped; later batches still run.
pub async fn upsert_in_batches(
    store: &dyn VectorStore,
    records: Vec<IndexRecord>,
    batch_size: usize,
) -> UploadSummary {
    let batch_size = batch_size.max(1);
    let total_batches = records.len().div_ceil(batch_size);
    let mut summary = UploadSummary {
        chunks: records.len(),
        ..Default::default()
    };

    let mut remaining = records.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<IndexRecord> = remaining.by_ref().take(batch_size).collect();
        let size = batch.len();
        summary.batches += 1;
        info!(store = store.backend(), "Uploading batch {}/{}", summary.batches, total_batches);

        match store.upsert(batch).await {
            Ok(report) => {
                info!("Successfully uploaded {} vectors", report.count);
                summary.succeeded += report.count;
            }
            Err(e) => {
                error!(batch = summary.batches, error = %format!("{:#}", e), "Error uploading batch");
                summary.failed_batches += 1;
                summary.failed += size;
            }
        }
    }

    summary
}

/// Builds records for documents and writes them to a store.
#[derive(Clone)]
pub struct Indexer {
    chunker: Chunker,
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl Indexer {
    pub fn new(chunker: Chunker, embedder: Embedder, store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            chunker,
            embedder,
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Chunks and embeds one document.
    ///
    /// Chunks are embedded sequentially. Every record gets the default
    /// metadata (text, title, source, chunk position) with the document's own
    /// metadata merged on top.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] on the first chunk that fails to embed.
    pub async fn prepare(&self, document: &Document) -> Result<Vec<IndexRecord>> {
        let chunks = self.chunker.chunk(document);
        let total = chunks.len();
        if total == 0 {
            warn!(document = %document.id, "No chunks created for document");
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(total);
        for chunk in chunks {
            info!(
                "Generating embedding for chunk {}/{} of document: {}",
                chunk.index + 1,
                total,
                document.title
            );
            let values = self.embedder.embed(&chunk.text).await?;

            let mut metadata = RecordMetadata {
                text: chunk.text.clone(),
                title: document.title.clone(),
                source: document.source.clone(),
                chunk_index: chunk.index as u64,
                total_chunks: chunk.total as u64,
                extra: Default::default(),
            };
            metadata.apply_overrides(&document.metadata);

            records.push(IndexRecord {
                id: chunk.id(),
                values,
                metadata,
            });
        }

        Ok(records)
    }

    /// Embeds every document, then uploads all records in batches.
    pub async fn upload(&self, documents: &[Document]) -> Result<UploadSummary> {
        let mut records = Vec::new();
        for document in documents {
            records.extend(self.prepare(document).await?);
        }

        let mut summary = upsert_in_batches(self.store.as_ref(), records, self.batch_size).await;
        summary.documents = documents.len();

        info!(
            documents = summary.documents,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Upload complete! Total vectors uploaded: {}",
            summary.succeeded
        );
        Ok(summary)
    }

    /// Uploads text files. Directories are walked recursively; files that are
    /// not valid UTF-8 are skipped with a warning.
    pub async fn upload_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<UploadSummary> {
        let files = collect_files(paths)?;
        info!("Found {} files to index", files.len());

        let mut documents = Vec::with_capacity(files.len());
        for path in &files {
            match document_from_file(path).await {
                Ok(document) => documents.push(document),
                Err(RagError::Io { path, source }) if source.kind() == std::io::ErrorKind::InvalidData => {
                    warn!(file = %path.display(), "Skipping file that is not valid UTF-8");
                }
                Err(e) => return Err(e),
            }
        }

        self.upload(&documents).await
    }
}

/// Expands paths into the list of regular files beneath them, sorted within
/// each directory.
pub fn collect_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RagError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| RagError::Io {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() {
                debug!(file = %entry.path().display(), "File queued for indexing");
                files.push(entry.into_path());
            }
        }
    }

    Ok(files)
}

/// Deterministic document id for a file path.
pub fn file_document_id(path: &Path) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, path.to_string_lossy().as_bytes()).to_string()
}

/// Reads a UTF-8 file into a document titled after the file name.
pub async fn document_from_file(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path).await.map_err(|source| RagError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let title = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Document::new(file_document_id(path), text)
        .with_title(title)
        .with_source(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddingProvider;
    use crate::rag::memory_store::InMemoryStore;
    use crate::rag::schema::{CollectionSchema, IndexSpec};
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> crate::provider::Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn indexer(store: Arc<InMemoryStore>, batch_size: usize) -> Indexer {
        Indexer::new(
            Chunker::new(50, 10).unwrap(),
            Embedder::new(Arc::new(LengthEmbedder)),
            store,
            batch_size,
        )
    }

    fn memory_store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new(CollectionSchema::standard(2, IndexSpec::default())))
    }

    #[tokio::test]
    async fn test_prepare_assigns_ids_and_metadata() {
        let store = memory_store();
        let document = Document::new("doc1", "word ".repeat(25))
            .with_title("Words")
            .with_metadata("source", "override")
            .with_metadata("category", "test");

        let records = indexer(store, 10).prepare(&document).await.unwrap();

        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.id, format!("doc1_chunk_{}", i));
            assert_eq!(record.metadata.chunk_index, i as u64);
            assert_eq!(record.metadata.total_chunks, 3);
            assert_eq!(record.metadata.title, "Words");
            assert_eq!(record.metadata.source, "override");
            assert_eq!(record.metadata.extra.get("category").map(String::as_str), Some("test"));
        }
    }

    #[tokio::test]
    async fn test_reupload_does_not_duplicate() {
        let store = memory_store();
        let indexer = indexer(store.clone(), 2);
        let document = Document::new("doc1", "word ".repeat(25));

        let first = indexer.upload(std::slice::from_ref(&document)).await.unwrap();
        let second = indexer.upload(&[document]).await.unwrap();

        assert_eq!(first.succeeded, 3);
        assert_eq!(first.batches, 2);
        assert_eq!(second.succeeded, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_document_yields_nothing() {
        let store = memory_store();
        let summary = indexer(store, 10).upload(&[Document::new("blank", "   ")]).await.unwrap();
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.chunks, 0);
        assert_eq!(summary.batches, 0);
    }

    #[tokio::test]
    async fn test_upload_paths_walks_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "Alpha text.").unwrap();
        std::fs::write(dir.path().join("nested").join("b.md"), "Beta text.").unwrap();
        let mut binary = std::fs::File::create(dir.path().join("c.bin")).unwrap();
        binary.write_all(&[0xff, 0xfe, 0x00]).unwrap();

        let store = memory_store();
        let summary = indexer(store.clone(), 10).upload_paths(&[dir.path()]).await.unwrap();

        assert_eq!(summary.documents, 2);
        assert_eq!(summary.succeeded, 2);

        let id = format!("{}_chunk_0", file_document_id(&dir.path().join("a.txt")));
        let record = store.get(&id).await.unwrap();
        assert_eq!(record.metadata.title, "a.txt");
        assert_eq!(record.metadata.text, "Alpha text.");
    }

    /// Rejects its second upsert call, delegates the rest.
    struct FlakyStore {
        inner: InMemoryStore,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        fn backend(&self) -> &'static str {
            "flaky"
        }

        async fn create_collection(&self, schema: &CollectionSchema, drop_existing: bool) -> anyhow::Result<()> {
            self.inner.create_collection(schema, drop_existing).await
        }

        async fn upsert(&self, records: Vec<IndexRecord>) -> anyhow::Result<crate::rag::UpsertReport> {
            if self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 1 {
                anyhow::bail!("connection reset");
            }
            self.inner.upsert(records).await
        }

        async fn search(&self, query: &[f32], top_k: usize) -> anyhow::Result<Vec<crate::rag::RetrievalResult>> {
            self.inner.search(query, top_k).await
        }

        async fn export_all(&self) -> anyhow::Result<Vec<IndexRecord>> {
            self.inner.export_all().await
        }

        async fn count(&self) -> anyhow::Result<usize> {
            self.inner.count().await
        }

        async fn build_index(&self) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let store = FlakyStore {
            inner: InMemoryStore::new(CollectionSchema::standard(2, IndexSpec::default())),
            calls: Default::default(),
        };
        let records: Vec<IndexRecord> = (0..5)
            .map(|i| IndexRecord {
                id: format!("r{}", i),
                values: vec![i as f32, 1.0],
                metadata: Default::default(),
            })
            .collect();

        let summary = upsert_in_batches(&store, records, 2).await;

        assert_eq!(summary.batches, 3);
        assert_eq!(summary.failed_batches, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 3);
        assert!(!summary.is_complete());
        assert_eq!(store.count().await.unwrap(), 3);
        assert!(store.inner.get("r4").await.is_some());
        assert!(store.inner.get("r2").await.is_none());
    }

    #[test]
    fn test_collect_files_missing_path() {
        assert!(matches!(
            collect_files(&["/definitely/not/here"]),
            Err(RagError::Io { .. })
        ));
    }

    #[test]
    fn test_file_ids_are_stable() {
        let path = Path::new("docs/readme.md");
        assert_eq!(file_document_id(path), file_document_id(path));
        assert_ne!(file_document_id(path), file_document_id(Path::new("docs/other.md")));
    }
}
