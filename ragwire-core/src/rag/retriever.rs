//! Query-time retrieval and prompt composition.

use super::embedder::Embedder;
use super::store::{rank, VectorStore};
use super::types::RetrievalResult;
use super::{RagError, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Embeds queries and searches the store.
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Embedder, store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self { embedder, store, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Returns up to `top_k` hits (the configured default when `None`),
    /// best first.
    ///
    /// Results are re-sorted and truncated here whatever order the backend
    /// returned them in. An empty store gives an empty list, not an error.
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        let top_k = top_k.unwrap_or(self.top_k);
        if top_k == 0 {
            return Ok(Vec::new());
        }

        debug!("Generating query embedding for: {}", query);
        let query_embedding = self.embedder.embed(query).await?;

        let results = self
            .store
            .search(&query_embedding, top_k)
            .await
            .map_err(RagError::Store)?;
        let results = rank(results, top_k);

        info!("Found {} relevant documents", results.len());
        for (i, result) in results.iter().enumerate() {
            debug!(rank = i + 1, score = result.score, id = %result.id, title = %result.title(), "Retrieved chunk");
        }

        Ok(results)
    }
}

/// Builds the grounded prompt for a query from retrieved chunks.
///
/// Chunk texts are joined by a blank line, in the given order.
pub fn compose_prompt(query: &str, results: &[RetrievalResult]) -> String {
    let context = results
        .iter()
        .map(|result| result.text())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Based on the following context, please answer the user's question:\n\n\
         Context:\n{}\n\n\
         User Question: {}\n\n\
         Please provide a helpful answer based on the context provided. If the context doesn't contain relevant information, you can use your general knowledge but mention that the context didn't contain specific information about this topic.",
        context, query
    )
}

/// One console line per hit: rank, score to three decimals, title and a
/// short preview of the text.
pub fn describe_hit(rank: usize, result: &RetrievalResult) -> String {
    let preview: String = result.text().chars().take(100).collect();
    format!(
        "Document {} (score: {:.3}) {}: {}...",
        rank,
        result.score,
        result.title(),
        preview
    )
}
