//! LanceDB vector database storage implementation.
//!
//! Embedded, in-process storage with typed Arrow columns built from a
//! [`CollectionSchema`]. Extra metadata without a column of its own is kept as
//! a JSON string in the `extra` column.

use super::schema::{CollectionSchema, FieldKind, IndexSpec, IndexType, EXTRA_FIELD, VECTOR_FIELD};
use super::store::{rank, UpsertReport, VectorStore};
use super::types::{IndexRecord, RecordMetadata, RetrievalResult};
use anyhow::{bail, Context, Result};
use arrow_array::{
    array::{ArrayRef, FixedSizeListArray, Float32Array, Int64Array, StringArray},
    Array, RecordBatch, RecordBatchIterator,
};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use lancedb::arrow::arrow_schema::{DataType, Field, Schema};
use lancedb::index::vector::{IvfFlatIndexBuilder, IvfPqIndexBuilder};
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// LanceDB-based vector store for embedded deployment.
///
/// [`close`](VectorStore::close) drops the connection and table handles; any
/// later call fails.
pub struct LanceDbStore {
    conn: RwLock<Option<Connection>>,
    path: String,
    table_name: String,
    table: RwLock<Option<Table>>,
    schema: RwLock<CollectionSchema>,
}

impl LanceDbStore {
    /// Builds the Arrow schema for a collection.
    pub fn arrow_schema(schema: &CollectionSchema) -> Arc<Schema> {
        let mut fields: Vec<Field> = schema
            .fields
            .iter()
            .map(|field| {
                let data_type = match field.kind {
                    FieldKind::VarChar { .. } => DataType::Utf8,
                    FieldKind::Int64 => DataType::Int64,
                    FieldKind::FloatVector { dim } => DataType::FixedSizeList(
                        Arc::new(Field::new("item", DataType::Float32, true)),
                        dim as i32,
                    ),
                };
                let nullable = !field.primary && !matches!(field.kind, FieldKind::FloatVector { .. });
                Field::new(field.name.as_str(), data_type, nullable)
            })
            .collect();

        if schema.dynamic_field {
            fields.push(Field::new(EXTRA_FIELD, DataType::Utf8, true));
        }

        Arc::new(Schema::new(fields))
    }

    /// Opens (or creates) the dataset at `path` and ensures the table exists.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory path where LanceDB should store data
    /// * `table_name` - Name of the table to use
    /// * `schema` - Column layout for a new table
    pub async fn open(path: &str, table_name: &str, schema: CollectionSchema) -> Result<Self> {
        let conn = connect(path)
            .execute()
            .await
            .with_context(|| format!("Failed to connect to LanceDB at {}", path))?;

        let table = Self::ensure_table(&conn, table_name, &schema, false).await?;
        info!(path, table = table_name, "Opened LanceDB dataset");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            path: path.to_string(),
            table_name: table_name.to_string(),
            table: RwLock::new(Some(table)),
            schema: RwLock::new(schema),
        })
    }

    async fn ensure_table(
        conn: &Connection,
        table_name: &str,
        schema: &CollectionSchema,
        drop_existing: bool,
    ) -> Result<Table> {
        let table_names = conn.table_names().execute().await?;
        let mut exists = table_names.iter().any(|name| name == table_name);

        if exists && drop_existing {
            conn.drop_table(table_name, &[])
                .await
                .context("Failed to drop table")?;
            info!(table = table_name, "Dropped existing table");
            exists = false;
        }

        if exists {
            conn.open_table(table_name)
                .execute()
                .await
                .context("Failed to open LanceDB table")
        } else {
            let table = conn
                .create_empty_table(table_name, Self::arrow_schema(schema))
                .execute()
                .await
                .context("Failed to create LanceDB table")?;
            info!(table = table_name, "Created table");
            Ok(table)
        }
    }

    fn to_batch(schema: &CollectionSchema, records: &[IndexRecord]) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields.len() + 1);

        for field in &schema.fields {
            let column: ArrayRef = match field.kind {
                FieldKind::VarChar { .. } => Arc::new(StringArray::from(
                    records
                        .iter()
                        .map(|r| r.string_field(&field.name))
                        .collect::<Vec<_>>(),
                )),
                FieldKind::Int64 => Arc::new(Int64Array::from(
                    records
                        .iter()
                        .map(|r| r.int_field(&field.name))
                        .collect::<Vec<_>>(),
                )),
                FieldKind::FloatVector { dim } => {
                    if let Some(bad) = records.iter().find(|r| r.values.len() != dim) {
                        bail!(
                            "record {} has {} dimensions, table expects {}",
                            bad.id,
                            bad.values.len(),
                            dim
                        );
                    }
                    let values: Vec<f32> = records.iter().flat_map(|r| r.values.iter().copied()).collect();
                    Arc::new(
                        FixedSizeListArray::try_new(
                            Arc::new(Field::new("item", DataType::Float32, true)),
                            dim as i32,
                            Arc::new(Float32Array::from(values)),
                            None,
                        )
                        .context("Failed to build vector column")?,
                    )
                }
            };
            columns.push(column);
        }

        if schema.dynamic_field {
            let extra = records
                .iter()
                .map(|r| serde_json::to_string(&r.metadata.extra).map(Some))
                .collect::<serde_json::Result<Vec<Option<String>>>>()?;
            columns.push(Arc::new(StringArray::from(extra)));
        }

        RecordBatch::try_new(Self::arrow_schema(schema), columns).context("Failed to create record batch")
    }

    /// Reads rows back into records. `_distance` is returned when present.
    fn from_batch(batch: &RecordBatch) -> Result<Vec<(IndexRecord, Option<f32>)>> {
        let ids = string_column(batch, "id")?.context("Missing 'id' column")?;
        let vectors = batch
            .column_by_name(VECTOR_FIELD)
            .context("Missing 'vector' column")?
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .context("Failed to cast 'vector' to FixedSizeListArray")?;
        let text = string_column(batch, "text")?;
        let title = string_column(batch, "title")?;
        let source = string_column(batch, "source")?;
        let chunk_index = int_column(batch, "chunk_index")?;
        let total_chunks = int_column(batch, "total_chunks")?;
        let extra = string_column(batch, EXTRA_FIELD)?;
        let distances = match batch.column_by_name("_distance") {
            Some(col) => Some(
                col.as_any()
                    .downcast_ref::<Float32Array>()
                    .context("Failed to cast '_distance' to Float32Array")?,
            ),
            None => None,
        };

        let mut rows = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let vector = vectors.value(i);
            let values = vector
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("Failed to cast vector items to Float32Array")?
                .values()
                .to_vec();

            let extra_json = string_at(extra, i);
            let extra: BTreeMap<String, String> = if extra_json.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&extra_json).context("Failed to parse 'extra' column")?
            };

            let record = IndexRecord {
                id: ids.value(i).to_string(),
                values,
                metadata: RecordMetadata {
                    text: string_at(text, i),
                    title: string_at(title, i),
                    source: string_at(source, i),
                    chunk_index: integer_at(chunk_index, i),
                    total_chunks: integer_at(total_chunks, i),
                    extra,
                },
            };
            rows.push((record, distances.map(|d| d.value(i))));
        }

        Ok(rows)
    }

    async fn current_table(&self) -> Result<Table> {
        self.table
            .read()
            .await
            .clone()
            .with_context(|| format!("LanceDB store at {} is closed", self.path))
    }

    async fn connection(&self) -> Result<Connection> {
        self.conn
            .read()
            .await
            .clone()
            .with_context(|| format!("LanceDB store at {} is closed", self.path))
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a StringArray>> {
    match batch.column_by_name(name) {
        Some(col) => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(Some)
            .with_context(|| format!("Failed to cast '{}' to StringArray", name)),
        None => Ok(None),
    }
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<Option<&'a Int64Array>> {
    match batch.column_by_name(name) {
        Some(col) => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(Some)
            .with_context(|| format!("Failed to cast '{}' to Int64Array", name)),
        None => Ok(None),
    }
}

fn string_at(array: Option<&StringArray>, i: usize) -> String {
    array
        .filter(|a| !a.is_null(i))
        .map(|a| a.value(i).to_string())
        .unwrap_or_default()
}

fn integer_at(array: Option<&Int64Array>, i: usize) -> u64 {
    array
        .filter(|a| !a.is_null(i))
        .and_then(|a| u64::try_from(a.value(i)).ok())
        .unwrap_or(0)
}

#[async_trait]
impl VectorStore for LanceDbStore {
    fn backend(&self) -> &'static str {
        "lancedb"
    }

    async fn create_collection(&self, schema: &CollectionSchema, drop_existing: bool) -> Result<()> {
        let conn = self.connection().await?;
        let table = Self::ensure_table(&conn, &self.table_name, schema, drop_existing).await?;
        *self.table.write().await = Some(table);
        *self.schema.write().await = schema.clone();
        Ok(())
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<UpsertReport> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }

        let batch = {
            let schema = self.schema.read().await;
            Self::to_batch(&schema, &records)?
        };
        let schema_ref = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema_ref);

        let table = self.current_table().await?;
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .context("Failed to upsert rows into LanceDB")?;

        let ids: Vec<String> = records.into_iter().map(|r| r.id).collect();
        debug!(table = %self.table_name, count = ids.len(), "Upserted rows");
        Ok(UpsertReport {
            count: ids.len(),
            ids,
        })
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let nprobe = self.schema.read().await.index.nprobe;
        let table = self.current_table().await?;

        let stream = table
            .query()
            .nearest_to(query_embedding)?
            .distance_type(DistanceType::Cosine)
            .nprobes(nprobe)
            .limit(top_k)
            .execute()
            .await
            .context("Failed to execute LanceDB query")?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut results = Vec::new();
        for batch in &batches {
            for (record, distance) in Self::from_batch(batch)? {
                results.push(RetrievalResult {
                    id: record.id,
                    score: 1.0 - distance.unwrap_or(1.0),
                    metadata: record.metadata,
                });
            }
        }

        Ok(rank(results, top_k))
    }

    async fn export_all(&self) -> Result<Vec<IndexRecord>> {
        let table = self.current_table().await?;
        let total = table.count_rows(None).await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let stream = table
            .query()
            .limit(total)
            .execute()
            .await
            .context("Failed to query all rows")?;
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect query results")?;

        let mut records = Vec::with_capacity(total);
        for batch in &batches {
            records.extend(Self::from_batch(batch)?.into_iter().map(|(record, _)| record));
        }
        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        let count = self.current_table().await?.count_rows(None).await?;
        Ok(count)
    }

    async fn build_index(&self) -> Result<bool> {
        let spec: IndexSpec = self.schema.read().await.index;
        let table = self.current_table().await?;
        let rows = table.count_rows(None).await?;

        if spec.index_type == IndexType::Flat {
            info!(table = %self.table_name, "Flat index requested, searches stay exhaustive");
            return Ok(false);
        }
        if rows < spec.nlist {
            warn!(
                table = %self.table_name,
                rows,
                nlist = spec.nlist,
                "Too few rows to train an IVF index, searches stay exhaustive"
            );
            return Ok(false);
        }

        let partitions = spec.nlist as u32;
        let index = match spec.index_type {
            IndexType::IvfPq => Index::IvfPq(
                IvfPqIndexBuilder::default()
                    .distance_type(DistanceType::Cosine)
                    .num_partitions(partitions),
            ),
            _ => Index::IvfFlat(
                IvfFlatIndexBuilder::default()
                    .distance_type(DistanceType::Cosine)
                    .num_partitions(partitions),
            ),
        };

        table
            .create_index(&[VECTOR_FIELD], index)
            .execute()
            .await
            .context("Failed to build vector index")?;
        info!(table = %self.table_name, nlist = spec.nlist, "Built vector index");
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        let table = self.table.write().await.take();
        let conn = self.conn.write().await.take();
        if table.is_some() || conn.is_some() {
            info!(path = %self.path, "Closed LanceDB dataset");
        }
        Ok(())
    }
}
