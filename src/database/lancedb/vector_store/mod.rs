
use super::{DocumentRecord, IndexedDocument, VectorIndex};
use crate::AskdocsError;
use anyhow::Result;
use arrow::array::{Array, FixedSizeListArray, Float32Array, Float64Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "documents";

/// Vector index store backed by LanceDB.
pub struct VectorStore {
    connection: Connection,
    vector_dimension: Option<usize>,
}

impl VectorStore {
    /// Open (or create) the vector index under the given directory.
    #[inline]
    pub async fn new(db_path: &Path) -> Result<Self, AskdocsError> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AskdocsError::Database(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            vector_dimension: None,
        };
        store.detect_table().await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    /// Look up an existing table and remember its vector dimension. The
    /// table itself is created lazily on first upsert, when the dimension
    /// is known from the data.
    async fn detect_table(&mut self) -> Result<(), AskdocsError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            debug!("Documents table does not exist yet");
            return Ok(());
        }

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to open table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    self.vector_dimension = Some(*size as usize);
                    debug!("Detected existing vector dimension: {}", size);
                    return Ok(());
                }
            }
        }

        Err(AskdocsError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("document_type", DataType::Utf8, false),
            Field::new("confidence", DataType::Float64, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("document_url", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn ensure_table(&mut self, vector_dim: usize) -> Result<(), AskdocsError> {
        if self.vector_dimension == Some(vector_dim) {
            return Ok(());
        }

        if self.vector_dimension.is_some() {
            warn!(
                "Vector dimension changed from {:?} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.connection
                .drop_table(TABLE_NAME)
                .await
                .map_err(|e| AskdocsError::Database(format!("Failed to drop table: {}", e)))?;
        }

        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            self.connection
                .create_empty_table(TABLE_NAME, Self::create_schema(vector_dim))
                .execute()
                .await
                .map_err(|e| AskdocsError::Database(format!("Failed to create table: {}", e)))?;
            info!("Documents table created with {} dimensions", vector_dim);
        }

        self.vector_dimension = Some(vector_dim);
        Ok(())
    }

    /// Upsert a record keyed by its identifier: delete any existing row for
    /// the id, then insert the new one.
    #[inline]
    pub async fn upsert_document(&mut self, record: &DocumentRecord) -> Result<bool, AskdocsError> {
        if record.vector.is_empty() {
            return Err(AskdocsError::Database(
                "Cannot store a record with an empty vector".to_string(),
            ));
        }
        // Ids come from sanitize_document_id and cannot carry quotes, but
        // the delete predicate below is a raw SQL string, so refuse anything
        // that would break out of it.
        if record.id.contains('\'') {
            return Err(AskdocsError::Database(format!(
                "Invalid record id: {}",
                record.id
            )));
        }

        self.ensure_table(record.vector.len()).await?;

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to open table: {}", e)))?;

        table
            .delete(&format!("id = '{}'", record.id))
            .await
            .map_err(|e| {
                AskdocsError::Database(format!("Failed to delete existing record: {}", e))
            })?;

        let record_batch = self.create_record_batch(record)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to insert record: {}", e)))?;

        debug!("Upserted document record {}", record.id);
        Ok(true)
    }

    fn create_record_batch(&self, record: &DocumentRecord) -> Result<RecordBatch, AskdocsError> {
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| AskdocsError::Database("Vector dimension not set".to_string()))?;

        let values_array = Float32Array::from(record.vector.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    AskdocsError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![record.id.as_str()])),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![record.document_type.as_str()])),
            Arc::new(Float64Array::from(vec![record.confidence])),
            Arc::new(StringArray::from(vec![record.content.as_str()])),
            Arc::new(StringArray::from(vec![record.document_url.as_str()])),
            Arc::new(StringArray::from(vec![Utc::now().to_rfc3339()])),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| AskdocsError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Search for records similar to the query vector.
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexedDocument>, AskdocsError> {
        debug!("Searching for similar vectors with limit: {}", top_k);

        if self.vector_dimension.is_none() {
            // Nothing has been ingested yet.
            return Ok(Vec::new());
        }

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to open table: {}", e)))?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| AskdocsError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(top_k);

        let mut results = query
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to execute search: {}", e)))?;

        let mut documents = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to read result stream: {}", e)))?
        {
            documents.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results", documents.len());
        Ok(documents)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<IndexedDocument>, AskdocsError> {
        let num_rows = batch.num_rows();
        let mut documents = Vec::with_capacity(num_rows);

        let ids = string_column(batch, "id")?;
        let document_types = string_column(batch, "document_type")?;
        let contents = string_column(batch, "content")?;
        let document_urls = string_column(batch, "document_url")?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        for row in 0..num_rows {
            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            documents.push(IndexedDocument {
                id: ids.value(row).to_string(),
                document_type: document_types.value(row).to_string(),
                content: contents.value(row).to_string(),
                document_url: document_urls.value(row).to_string(),
                similarity_score: 1.0 - distance,
            });
        }

        Ok(documents)
    }

    /// Total number of records stored.
    #[inline]
    pub async fn count_documents(&self) -> Result<u64, AskdocsError> {
        if self.vector_dimension.is_none() {
            return Ok(0);
        }

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| AskdocsError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a StringArray, AskdocsError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AskdocsError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AskdocsError::Database(format!("Invalid {} column type", name)))
}

/// `VectorStore` mutates internal dimension state on upsert, so the trait
/// impl wraps it in a tokio mutex for shared use.
pub struct SharedVectorStore(tokio::sync::Mutex<VectorStore>);

impl SharedVectorStore {
    #[inline]
    pub fn new(store: VectorStore) -> Self {
        Self(tokio::sync::Mutex::new(store))
    }
}

#[async_trait]
impl VectorIndex for SharedVectorStore {
    #[inline]
    async fn upsert(&self, record: &DocumentRecord) -> Result<bool> {
        let mut store = self.0.lock().await;
        Ok(store.upsert_document(record).await?)
    }

    #[inline]
    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<IndexedDocument>> {
        let store = self.0.lock().await;
        Ok(store.search_similar(query_vector, top_k).await?)
    }
}
