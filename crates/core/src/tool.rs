//! Tool trait — the abstraction over retrieval capabilities.
//!
//! Tools are what the model may invoke mid-turn to ground its answer in
//! catalog data. The dispatch loop looks tools up in the [`ToolRegistry`]
//! and feeds their JSON output back to the model.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A resolved request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The call ID this output answers
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The serialized output content (JSON for catalog tools)
    pub output: String,
}

/// The core Tool trait.
///
/// Each retrieval capability (book recommendations, book summaries)
/// implements this trait. Tools are registered in the ToolRegistry and
/// offered to the model by the dispatch loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_book_recommendations").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The dispatch loop uses this to:
/// 1. Get tool definitions to offer the model
/// 2. Look up and execute tools when the model requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for offering to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut output = tool.execute(call.arguments.clone()).await?;
        output.call_id = call.id.clone();
        Ok(output)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
