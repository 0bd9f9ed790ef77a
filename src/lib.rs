//! ragwire - retrieval augmented generation over a hosted LLM
//!
//! This is the convenience wrapper crate that re-exports `ragwire-core`.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! ragwire = "0.1"
//! ```
//!
//! ```no_run
//! use ragwire::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load_or_default();
//! let engine = RagEngine::open(&config, Arc::new(OllamaProvider::new(&config.embedding))).await?;
//! let manager = ChatManager::new(config.clone(), Arc::new(OpenAiProvider::from_config(&config)))
//!     .with_rag(engine);
//!
//! let answer = manager.ask("What are Legus' favorite foods?").await?;
//! println!("{}", answer.content);
//! # Ok(())
//! # }
//! ```

// Re-export core
pub use ragwire_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use ragwire_core::rag::{
        CollectionSchema, Embedder, IndexRecord, IndexSpec, InMemoryStore, UploadSummary, VectorStore,
    };
    pub use ragwire_core::tools::{ToolHandler, ToolRegistry};
    pub use ragwire_core::*;
}
