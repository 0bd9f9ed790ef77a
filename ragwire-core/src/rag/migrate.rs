//! Export a store to files and import those files into another store.
//!
//! Export writes a pretty-printed JSON array of [`ExportRecord`]s and a bincode
//! copy next to it (same stem, `.bin`). Either file can be fed back to
//! [`migrate`]. This is a one-shot copy, not replication.

use super::indexer::{upsert_in_batches, UploadSummary};
use super::schema::CollectionSchema;
use super::store::VectorStore;
use super::types::{ExportRecord, IndexRecord, RetrievalResult};
use super::{RagError, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Number of hits the post-migration smoke search asks for.
pub const SMOKE_TEST_TOP_K: usize = 3;

/// Paths written by [`write_export`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFiles {
    pub json: PathBuf,
    pub binary: PathBuf,
}

/// What an export contained.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub count: usize,
    pub dimension: Option<usize>,
    pub metadata_keys: Vec<String>,
    pub sample: Option<ExportRecord>,
}

impl ExportSummary {
    pub fn of(records: &[ExportRecord]) -> Self {
        let metadata_keys: BTreeSet<String> = records
            .iter()
            .flat_map(|record| record.metadata.keys())
            .collect();

        Self {
            count: records.len(),
            dimension: records.first().map(|record| record.values.len()),
            metadata_keys: metadata_keys.into_iter().collect(),
            sample: records.first().cloned(),
        }
    }
}

/// The `.bin` sibling of an export path.
pub fn binary_path(path: &Path) -> PathBuf {
    path.with_extension("bin")
}

fn export_error(path: &Path, message: impl ToString) -> RagError {
    RagError::Export {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Reads every record out of a store.
pub async fn export_records(store: &dyn VectorStore) -> Result<Vec<ExportRecord>> {
    let records = store.export_all().await.map_err(RagError::Store)?;
    info!(store = store.backend(), count = records.len(), "Fetched records for export");
    Ok(records.into_iter().map(ExportRecord::from).collect())
}

/// Writes `records` as JSON to `path` and as bincode to its `.bin` sibling.
pub fn write_export(records: &[ExportRecord], path: &Path) -> Result<ExportFiles> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| export_error(parent, e))?;
    }

    let file = File::create(path).map_err(|e| export_error(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records).map_err(|e| export_error(path, e))?;
    writer.flush().map_err(|e| export_error(path, e))?;

    let binary = binary_path(path);
    let file = File::create(&binary).map_err(|e| export_error(&binary, e))?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, records).map_err(|e| export_error(&binary, e))?;
    writer.flush().map_err(|e| export_error(&binary, e))?;

    info!(json = %path.display(), binary = %binary.display(), count = records.len(), "Wrote export files");
    Ok(ExportFiles {
        json: path.to_path_buf(),
        binary,
    })
}

/// Reads an export file. `.bin` files are decoded as bincode, anything else
/// as JSON.
pub fn load_export(path: &Path) -> Result<Vec<ExportRecord>> {
    let file = File::open(path).map_err(|e| export_error(path, e))?;
    let reader = BufReader::new(file);

    let is_binary = path.extension().is_some_and(|ext| ext == "bin");
    let records: Vec<ExportRecord> = if is_binary {
        bincode::deserialize_from(reader).map_err(|e| export_error(path, e))?
    } else {
        serde_json::from_reader(reader).map_err(|e| export_error(path, e))?
    };

    info!(path = %path.display(), count = records.len(), "Loaded export file");
    Ok(records)
}

/// Exports a store to `path`. Returns `None` and writes nothing when the
/// store is empty.
pub async fn export_to_file(store: &dyn VectorStore, path: &Path) -> Result<Option<(ExportFiles, ExportSummary)>> {
    let records = export_records(store).await?;
    if records.is_empty() {
        warn!(store = store.backend(), "No vectors found to export");
        return Ok(None);
    }

    let files = write_export(&records, path)?;
    Ok(Some((files, ExportSummary::of(&records))))
}

/// Knobs for [`migrate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MigrationOptions {
    /// Drop the target collection first if it exists.
    pub drop_existing: bool,
    pub batch_size: usize,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            drop_existing: true,
            batch_size: super::indexer::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub loaded: usize,
    pub upload: UploadSummary,
    pub index_built: bool,
    pub final_count: usize,
    /// Hits for the first record's vector, best first.
    pub smoke_test: Vec<RetrievalResult>,
}

/// Imports exported records into `store`.
///
/// Every record is checked against `schema` before anything is written, so a
/// bad file leaves the target untouched. Then the collection is declared,
/// records are inserted in batches, the index is built, and a search with the
/// first record's vector checks the result.
pub async fn migrate(
    store: &dyn VectorStore,
    schema: &CollectionSchema,
    records: Vec<ExportRecord>,
    options: MigrationOptions,
) -> Result<MigrationReport> {
    let loaded = records.len();
    let records: Vec<IndexRecord> = records.into_iter().map(IndexRecord::from).collect();

    for record in &records {
        schema.validate(record)?;
    }
    info!(count = loaded, "Validated records against schema");

    store
        .create_collection(schema, options.drop_existing)
        .await
        .map_err(RagError::Store)?;

    let first_values = records.first().map(|record| record.values.clone());
    let upload = upsert_in_batches(store, records, options.batch_size).await;

    let index_built = store.build_index().await.map_err(RagError::Store)?;
    let final_count = store.count().await.map_err(RagError::Store)?;
    info!(store = store.backend(), final_count, "Migration complete");

    let smoke_test = match first_values {
        Some(vector) => store
            .search(&vector, SMOKE_TEST_TOP_K)
            .await
            .map_err(RagError::Store)?,
        None => Vec::new(),
    };

    Ok(MigrationReport {
        loaded,
        upload,
        index_built,
        final_count,
        smoke_test,
    })
}

/// [`load_export`] followed by [`migrate`].
pub async fn migrate_from_file(
    store: &dyn VectorStore,
    schema: &CollectionSchema,
    path: &Path,
    options: MigrationOptions,
) -> Result<MigrationReport> {
    let records = load_export(path)?;
    migrate(store, schema, records, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::memory_store::InMemoryStore;
    use crate::rag::types::RecordMetadata;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn export_record(id: &str) -> ExportRecord {
        ExportRecord {
            id: id.to_string(),
            values: vec![0.25, -0.5, 1.0],
            metadata: RecordMetadata {
                text: "Légume café 日本".into(),
                title: "Unicode".into(),
                source: "test".into(),
                chunk_index: 0,
                total_chunks: 1,
                extra: BTreeMap::from([("category".to_string(), "food".to_string())]),
            },
            score: None,
        }
    }

    #[test]
    fn test_write_and_load_both_formats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("vector_export.json");
        let records = vec![export_record("a"), export_record("b")];

        let files = write_export(&records, &path).unwrap();
        assert_eq!(files.binary, dir.path().join("out").join("vector_export.bin"));

        assert_eq!(load_export(&files.json).unwrap(), records);
        assert_eq!(load_export(&files.binary).unwrap(), records);

        let json = std::fs::read_to_string(&files.json).unwrap();
        assert!(json.contains("Légume café 日本"));
        assert!(json.contains("\n  "));
    }

    #[test]
    fn test_summary() {
        let summary = ExportSummary::of(&[export_record("a")]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.dimension, Some(3));
        assert!(summary.metadata_keys.contains(&"category".to_string()));
        assert!(summary.metadata_keys.contains(&"total_chunks".to_string()));
    }

    fn schema() -> CollectionSchema {
        CollectionSchema::standard(3, crate::rag::IndexSpec::default())
    }

    #[tokio::test]
    async fn test_migrate_between_stores() {
        let source = InMemoryStore::new(schema());
        source
            .upsert(vec![export_record("a").into(), export_record("b").into()])
            .await
            .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_export.json");
        let (files, summary) = export_to_file(&source, &path).await.unwrap().unwrap();
        assert_eq!(summary.count, 2);

        let target = InMemoryStore::new(schema());
        let options = MigrationOptions {
            batch_size: 1,
            ..Default::default()
        };
        let report = migrate_from_file(&target, &schema(), &files.binary, options).await.unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.upload.batches, 2);
        assert!(report.upload.is_complete());
        assert!(!report.index_built);
        assert_eq!(report.final_count, 2);
        assert_eq!(report.smoke_test.len(), 2);
        assert_eq!(target.get("a").await.unwrap().metadata, export_record("a").metadata);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_target_untouched() {
        let target = InMemoryStore::new(schema());
        target.upsert(vec![export_record("keep").into()]).await.unwrap();

        let mut bad = export_record("bad");
        bad.values.push(0.0);

        let result = migrate(&target, &schema(), vec![export_record("a"), bad], MigrationOptions::default()).await;
        assert!(matches!(result, Err(RagError::Schema(_))));
        assert_eq!(target.count().await.unwrap(), 1);
        assert!(target.get("keep").await.is_some());
    }

    #[tokio::test]
    async fn test_export_of_empty_store_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_export.json");
        let result = export_to_file(&InMemoryStore::new(schema()), &path).await.unwrap();
        assert!(result.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_flat_metadata_export_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pinecone_export.json");
        std::fs::write(
            &path,
            r#"[
  {
    "id": "d_chunk_0",
    "values": [0.1, 0.2, 0.3],
    "metadata": {
      "text": "Legus loves carbonara.",
      "title": "Foods",
      "chunk_index": 0.0,
      "total_chunks": 1.0,
      "category": "food"
    },
    "score": 0.0
  }
]"#,
        )
        .unwrap();

        let records = load_export(&path).unwrap();
        assert_eq!(records.len(), 1);
        let metadata = &records[0].metadata;
        assert_eq!(metadata.source, "");
        assert_eq!(metadata.chunk_index, 0);
        assert_eq!(metadata.total_chunks, 1);
        assert_eq!(metadata.extra.get("category").map(String::as_str), Some("food"));

        let target = InMemoryStore::new(schema());
        let report = migrate(&target, &schema(), records, MigrationOptions::default()).await.unwrap();
        assert_eq!(report.final_count, 1);
        let stored = target.get("d_chunk_0").await.unwrap();
        assert_eq!(stored.metadata.extra.get("category").map(String::as_str), Some("food"));

        let written = dir.path().join("round_trip.json");
        write_export(&[ExportRecord::from(stored)], &written).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(json[0]["metadata"]["category"], "food");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_export(Path::new("/no/such/export.json")),
            Err(RagError::Export { .. })
        ));
    }
}
