use super::{Result, ToolError, ToolHandler};
use crate::rag::Retriever;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Name under which the knowledge base search is offered to the model.
pub const SEARCH_KNOWLEDGE_BASE: &str = "search_knowledge_base";

const NO_RESULTS: &str = "No relevant documents found in the knowledge base.";

/// A model-supplied `top_k` is capped at this multiple of the configured one.
pub const MAX_TOP_K_FACTOR: usize = 4;

/// `search_knowledge_base(query, top_k)`: retrieval as a tool.
#[derive(Clone)]
pub struct SearchKnowledgeBase {
    retriever: Retriever,
}

impl SearchKnowledgeBase {
    pub fn new(retriever: Retriever) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl ToolHandler for SearchKnowledgeBase {
    fn name(&self) -> &str {
        SEARCH_KNOWLEDGE_BASE
    }

    fn description(&self) -> &str {
        "Search the knowledge base for documents relevant to a query. \
         Returns the most similar text chunks with their titles and similarity scores."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find relevant documents"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of documents to retrieve",
                    "default": self.retriever.top_k(),
                    "maximum": self.retriever.top_k() * MAX_TOP_K_FACTOR
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: SEARCH_KNOWLEDGE_BASE.to_string(),
                message: "missing string field 'query'".to_string(),
            })?;
        let max_top_k = self.retriever.top_k() * MAX_TOP_K_FACTOR;
        let top_k = arguments
            .get("top_k")
            .and_then(Value::as_u64)
            .map(|k| usize::try_from(k).unwrap_or(usize::MAX).min(max_top_k));

        let results = self.retriever.retrieve(query, top_k).await?;
        if results.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }

        let mut output = format!("Found {} relevant documents:\n", results.len());
        for (i, result) in results.iter().enumerate() {
            output.push_str(&format!(
                "\n[{}] {} (score: {:.3})\n{}\n",
                i + 1,
                result.title(),
                result.score,
                result.text()
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EmbeddingProvider;
    use crate::rag::{CollectionSchema, Embedder, InMemoryStore, IndexRecord, IndexSpec, RecordMetadata, VectorStore};
    use std::sync::Arc;

    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        async fn embed(&self, _text: &str) -> crate::provider::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    async fn tool(records: usize, top_k: usize) -> SearchKnowledgeBase {
        let store = Arc::new(InMemoryStore::new(CollectionSchema::standard(2, IndexSpec::default())));
        let records = (0..records)
            .map(|i| IndexRecord {
                id: format!("doc_chunk_{}", i),
                values: vec![1.0, i as f32 / 10.0],
                metadata: RecordMetadata {
                    text: format!("chunk {}", i),
                    title: "Doc".into(),
                    ..Default::default()
                },
            })
            .collect();
        store.upsert(records).await.unwrap();

        let embedder = Embedder::new(Arc::new(ConstantEmbedder));
        SearchKnowledgeBase::new(Retriever::new(embedder, store, top_k))
    }

    #[tokio::test]
    async fn test_model_top_k_is_capped() {
        let tool = tool(20, 2).await;
        let output = tool.execute(json!({"query": "x", "top_k": 1000})).await.unwrap();
        assert!(output.starts_with("Found 8 relevant documents:"));
    }

    #[tokio::test]
    async fn test_default_and_small_top_k() {
        let tool = tool(20, 2).await;
        let output = tool.execute(json!({"query": "x"})).await.unwrap();
        assert!(output.starts_with("Found 2 relevant documents:"));

        let output = tool.execute(json!({"query": "x", "top_k": 3})).await.unwrap();
        assert!(output.starts_with("Found 3 relevant documents:"));
        assert!(output.contains("[1] Doc (score: 1.000)\nchunk 0\n"));
    }

    #[tokio::test]
    async fn test_missing_query_is_rejected() {
        let tool = tool(1, 2).await;
        assert!(matches!(
            tool.execute(json!({"top_k": 2})).await,
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_store_reports_no_results() {
        let tool = tool(0, 2).await;
        assert_eq!(tool.execute(json!({"query": "x"})).await.unwrap(), NO_RESULTS);
    }
}
