//! Local tools the model may call during a tool-mediated turn.
//!
//! From the model's perspective a [`ToolHandler`] is a function with a name, a
//! description and a JSON parameter schema. The [`ToolRegistry`] advertises
//! them in requests and runs the calls that come back.

mod registry;
mod search;

pub use registry::ToolRegistry;
pub use search::{SearchKnowledgeBase, SEARCH_KNOWLEDGE_BASE};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(#[from] crate::rag::RagError),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// A capability the model can invoke by name.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name the model uses to call this tool.
    fn name(&self) -> &str;

    /// Included in the request to help the model decide when to call it.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameter_schema(&self) -> Value;

    /// Runs the tool. `arguments` has already been parsed from the call's
    /// JSON string. The returned text becomes the tool message content.
    async fn execute(&self, arguments: Value) -> Result<String>;
}
