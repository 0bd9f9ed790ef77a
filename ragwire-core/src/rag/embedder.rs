//! Embedding generation on top of an [`EmbeddingProvider`].
//!
//! This module provides functionality to convert text into vector embeddings
//! and guarantees every vector has the configured dimensionality.

use crate::provider::{EmbeddingProvider, ProviderError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model returned a vector of the wrong length.
    ///
    /// This typically means the configured model and dimensionality disagree.
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Converts text into fixed-length vectors.
///
/// Cheap to clone; the provider is shared.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The embedding endpoint is unreachable or rejects the request
    /// - The returned vector's length differs from [`dimensions`](Self::dimensions)
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.provider.embed(text).await?;

        let expected = self.dimensions();
        if embedding.len() != expected {
            return Err(EmbedderError::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedProvider {
        vector: Vec<f32>,
        dimensions: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> crate::provider::Result<Vec<f32>> {
            Ok(self.vector.clone())
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    #[tokio::test]
    async fn test_embed_checks_dimensions() {
        let embedder = Embedder::new(Arc::new(FixedProvider {
            vector: vec![0.1, 0.2],
            dimensions: 3,
        }));

        let err = embedder.embed("text").await.unwrap_err();
        assert!(matches!(
            err,
            EmbedderError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[tokio::test]
    async fn test_embed_passes_through() {
        let embedder = Embedder::new(Arc::new(FixedProvider {
            vector: vec![1.0, 0.0, 0.0],
            dimensions: 3,
        }));

        assert_eq!(embedder.embed("text").await.unwrap(), vec![1.0, 0.0, 0.0]);
    }
}
