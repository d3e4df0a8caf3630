//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider takes a message list, a system prompt, and tool schemas, and
//! answers with a stream of incremental fragments. Tool-call fragments are
//! keyed by the backend's call id; completion of each call is signalled
//! explicitly with [`StreamFragment::ToolCallFinished`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// Rebuilt on every iteration.
    pub system_prompt: String,

    /// The conversation messages (active history only)
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            messages,
            tools: Vec::new(),
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// Assistant text.
    Content { text: String },

    /// Part of a tool call. `name` is usually only present on the first
    /// fragment for an id.
    ToolCall {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        arguments: String,
    },

    /// The backend will send nothing more for this call id.
    ToolCallFinished { id: String },

    /// End of response.
    Done,
}

impl StreamFragment {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: Option<&str>, arguments: impl Into<String>) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.map(str::to_string),
            arguments: arguments.into(),
        }
    }

    pub fn finished(id: impl Into<String>) -> Self {
        Self::ToolCallFinished { id: id.into() }
    }
}

/// Receiving half of a streamed response.
///
/// Dropping it tells the producing task to stop and release the connection.
pub type FragmentStream = mpsc::Receiver<std::result::Result<StreamFragment, ProviderError>>;

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The agent loop calls `stream()`
/// without knowing which provider is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response fragments.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<FragmentStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest::new("gpt-4o", "be brief", vec![Message::user("hi")]);
        assert_eq!(req.model, "gpt-4o");
        assert!(req.tools.is_empty());
        assert!(req.temperature.is_none());
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn fragment_serialization_is_tagged() {
        let fragment = StreamFragment::tool_call("call_1", Some("shell"), "{\"command\":");
        let json = serde_json::to_value(&fragment).unwrap();
        assert_eq!(json["type"], "tool_call");
        assert_eq!(json["id"], "call_1");
        assert_eq!(json["name"], "shell");

        let back: StreamFragment = serde_json::from_value(json).unwrap();
        assert_eq!(back, fragment);
    }
}
