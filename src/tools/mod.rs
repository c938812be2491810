pub mod news;
pub mod transcribe;

use async_trait::async_trait;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ToolInvocationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("{tool} failed: {reason}")]
    Failed { tool: String, reason: String },
}

/// Object-safe view over a [`Tool`], so tools with different argument and
/// output types can share one registry.
#[async_trait]
pub trait RegisteredTool: Send + Sync {
    fn tool_name(&self) -> &'static str;

    async fn describe(&self) -> ToolDefinition;

    async fn invoke(&self, args: Value) -> Result<Value, ToolInvocationError>;
}

#[async_trait]
impl<T> RegisteredTool for T
where
    T: Tool + 'static,
{
    fn tool_name(&self) -> &'static str {
        T::NAME
    }

    async fn describe(&self) -> ToolDefinition {
        Tool::definition(self, String::new()).await
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolInvocationError> {
        let args: T::Args =
            serde_json::from_value(args).map_err(|err| ToolInvocationError::InvalidArguments {
                tool: T::NAME.to_string(),
                reason: err.to_string(),
            })?;
        let output = Tool::call(self, args)
            .await
            .map_err(|err| ToolInvocationError::Failed {
                tool: T::NAME.to_string(),
                reason: err.to_string(),
            })?;
        serde_json::to_value(output).map_err(|err| ToolInvocationError::Failed {
            tool: T::NAME.to_string(),
            reason: format!("unserializable output: {err}"),
        })
    }
}

/// The fixed set of tools advertised to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: impl RegisteredTool + 'static) -> Self {
        self.tools.retain(|t| t.tool_name() != tool.tool_name());
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.tool_name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            definitions.push(tool.describe().await);
        }
        definitions
    }

    /// Runs the named tool with JSON-encoded arguments as produced by a model.
    pub async fn invoke(&self, name: &str, arguments: &str) -> Result<Value, ToolInvocationError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.tool_name() == name)
            .ok_or_else(|| ToolInvocationError::UnknownTool(name.to_string()))?;
        let args = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments).map_err(|err| ToolInvocationError::InvalidArguments {
                tool: name.to_string(),
                reason: err.to_string(),
            })?
        };
        tool.invoke(args).await
    }
}
