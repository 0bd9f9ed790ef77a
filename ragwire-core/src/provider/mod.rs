//! Inference and embedding provider abstraction layer.
//!
//! [`Provider`] covers the hosted chat model, [`EmbeddingProvider`] the
//! embedding model. Both are traits so the pipeline can run against fakes.

mod types;
pub mod ollama;
pub mod openai;

// Re-export common types
pub use types::{
    Provider,
    EmbeddingProvider,
    ProviderError,
    Result,
    ChatRequest,
    ChatOutcome,
    Message,
    Tool,
    ToolCall,
    ToolFunction,
    ToolCallFunction,
    EmbedRequest,
    EmbedResponse,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
