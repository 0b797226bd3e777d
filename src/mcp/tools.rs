use crate::error::{AccordError, Result};
use crate::mcp::types::{CallResult, ToolDefinition};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

/// Async body of a tool: query in, answer text out
pub type ToolHandler = Arc<dyn Fn(String) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Input schema shared by every tool: a single `query` string
pub fn query_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query text"
            }
        },
        "required": ["query"]
    })
}

/// A named, described, invocable tool
#[derive(Clone)]
pub struct AgentTool {
    name: String,
    description: String,
    handler: ToolHandler,
}

impl AgentTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(move |query| handler(query).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// What tools/list shows for this tool
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: query_schema(),
        }
    }

    pub async fn invoke(&self, query: impl Into<String>) -> Result<String> {
        (self.handler)(query.into()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered set of tools with unique names
#[derive(Debug, Default, Clone)]
pub struct ToolBox {
    tools: Vec<AgentTool>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; a second tool with the same name is rejected
    pub fn push(&mut self, tool: AgentTool) -> Result<()> {
        if self.get(tool.name()).is_some() {
            return Err(AccordError::Tool(format!("Duplicate tool name: {}", tool.name())));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn into_tools(self) -> Vec<AgentTool> {
        self.tools
    }

    pub fn get(&self, name: &str) -> Option<&AgentTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions for tools/list
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(AgentTool::definition).collect()
    }

    /// Invoke a tool by name for tools/call.
    ///
    /// An unknown tool is an error; a failing tool body is reported as an
    /// `isError` result so the client sees the message.
    pub async fn call(&self, name: &str, query: &str) -> Result<CallResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| AccordError::Tool(format!("Unknown tool: {}", name)))?;

        let result = match tool.invoke(query).await {
            Ok(text) => CallResult::answer(text),
            Err(e) => {
                log::warn!("Tool {} failed: {}", name, e);
                CallResult::failure(format!("Error: {}", e))
            }
        };

        Ok(result)
    }
}
