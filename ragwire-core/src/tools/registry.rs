use super::{Result, ToolError, ToolHandler};
use crate::provider::{Tool, ToolCall};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Registry of tools offered to the model.
///
/// Tools are kept ordered by name so requests are reproducible.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions in the chat-completions `tools` format.
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|tool| Tool::function(tool.name(), tool.description(), tool.parameter_schema()))
            .collect()
    }

    /// Runs one tool call requested by the model.
    ///
    /// Empty argument strings are treated as `{}`.
    pub async fn execute(&self, call: &ToolCall) -> Result<String> {
        let name = &call.function.name;
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.clone()))?;

        let raw = call.function.arguments.trim();
        let arguments: Value = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
                tool: name.clone(),
                message: e.to_string(),
            })?
        };

        info!(tool_name = %name, call_id = %call.id, "Executing tool");
        tool.execute(arguments).await
    }
}
