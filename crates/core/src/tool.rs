//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! edit files, run shell commands, and change what the live context tracks.
//!
//! Every call goes through [`ToolRegistry::dispatch`], which looks the tool
//! up, parses the raw argument text, and validates it against the declared
//! schema before the tool body runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::paths::resolve_path;
use crate::provider::ToolDefinition;
use crate::schema;
use crate::session::{Session, SharedSession};

/// What a tool reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Rich description for the terminal (diffs, listings). May be empty.
    pub human: String,

    /// Minimal status that goes into the conversation.
    pub agent: String,
}

impl ToolOutput {
    pub fn new(human: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            human: human.into(),
            agent: agent.into(),
        }
    }

    pub fn agent_only(agent: impl Into<String>) -> Self {
        Self::new(String::new(), agent)
    }
}

/// Per-dispatch environment handed to a tool.
#[derive(Clone)]
pub struct ToolContext {
    pub session: SharedSession,
    working_dir: PathBuf,
    status: Option<mpsc::Sender<String>>,
}

impl ToolContext {
    pub fn new(session: SharedSession, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            working_dir: working_dir.into(),
            status: None,
        }
    }

    /// Attach the sending half of a bounded status queue.
    pub fn with_status(mut self, sender: mpsc::Sender<String>) -> Self {
        self.status = Some(sender);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolve a path argument to an absolute, normalized path.
    pub fn resolve(&self, tool_name: &str, raw: &str) -> Result<PathBuf, ToolError> {
        resolve_path(&self.working_dir, raw).map_err(|e| ToolError::invalid(tool_name, e))
    }

    /// Emit incremental status text. Never waits: when the queue is full or
    /// nobody is listening the update is dropped.
    pub fn status(&self, text: impl Into<String>) {
        if let Some(sender) = &self.status
            && let Err(err) = sender.try_send(text.into())
        {
            tracing::trace!(error = %err, "Status update dropped");
        }
    }
}

/// The core Tool trait.
///
/// Built-in tools and any extension tool implement this. Parameters arrive
/// already validated against [`Tool::parameters_schema`]; implementations
/// decode them into a typed struct with [`decode_params`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "edit_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> String;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given (validated) arguments.
    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    ///
    /// Tools whose description depends on session state override this.
    fn to_definition(&self, _session: &Session) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Decode validated arguments into a tool's parameter struct.
pub fn decode_params<P: DeserializeOwned>(tool_name: &str, arguments: Value) -> Result<P, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::invalid(tool_name, e))
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::from(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// A registry exposing only the named tools.
    pub fn subset(&self, names: &[&str]) -> Self {
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
            .collect();
        Self { tools }
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self, session: &Session) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition(session)).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Look up, parse, validate, and execute one call.
    pub async fn dispatch(&self, ctx: &ToolContext, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let arguments = parse_arguments(call)?;
        schema::validate(&tool.parameters_schema(), &arguments)
            .map_err(|e| ToolError::invalid(&call.name, e))?;

        tracing::debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        tool.execute(ctx, arguments).await
    }
}

/// Parse the accumulated argument text. An empty string means no arguments.
fn parse_arguments(call: &ToolCall) -> Result<Value, ToolError> {
    if call.arguments.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(&call.arguments).map_err(|e| ToolError::MalformedArguments {
        tool_name: call.name.clone(),
        reason: e.to_string(),
    })
}
