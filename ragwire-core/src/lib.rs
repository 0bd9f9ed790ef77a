//! ragwire-core - retrieval augmented generation plumbing
//!
//! Provides the components between an embedding model, a vector database and
//! a hosted chat model:
//! - Inference and embedding provider abstraction (OpenAI-compatible HTTP, Ollama)
//! - RAG pipeline: chunking, indexing, retrieval, prompt composition
//! - Vector stores (Qdrant, LanceDB, in-memory) and export/import between them
//! - Tool-mediated retrieval (`search_knowledge_base`)
//! - Configuration management

pub mod chat;
pub mod config;
pub mod provider;
pub mod rag;
pub mod samples;
pub mod tools;

pub use chat::{Answer, AnswerStatus, ChatManager, ConversationTurn, ToolCallRecord};
pub use config::{Config, StorageMode};
pub use rag::{Document, RagEngine, RagError, RetrievalResult};

// Provider exports
pub use provider::{
    ChatOutcome, ChatRequest, EmbeddingProvider, Message, OllamaProvider, OpenAiProvider, Provider,
    ProviderError, Tool, ToolCall, ToolCallFunction, ToolFunction,
};
