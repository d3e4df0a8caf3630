//! remove_message: tombstone a message from the conversation history.
//!
//! Not finding a match is a normal outcome, not a failure.

use async_trait::async_trait;
use parrot_core::error::ToolError;
use parrot_core::message::Role;
use parrot_core::tool::{Tool, ToolContext, ToolOutput, decode_params};
use serde::Deserialize;

pub const NAME: &str = "remove_message";

#[derive(Debug, Deserialize)]
struct RemoveMessageParams {
    role: Role,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    content_contains: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveMessageTool;

#[async_trait]
impl Tool for RemoveMessageTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "Remove a message from the conversation history to reduce context size. Identify it by message_id, or by role plus a substring of its content (the first matching message is removed).".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "role": {
                    "type": "string",
                    "enum": ["user", "assistant", "tool"],
                    "description": "Role of the message to remove"
                },
                "message_id": {
                    "type": "string",
                    "description": "ID of the message to remove"
                },
                "content_contains": {
                    "type": "string",
                    "description": "Text the message content contains"
                }
            },
            "required": ["role"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: RemoveMessageParams = decode_params(NAME, arguments)?;
        let role = params.role;

        let (deleted, target) = {
            let mut session = ctx.session.write().await;
            match (params.message_id.as_deref(), params.content_contains.as_deref()) {
                (Some(id), _) if !id.is_empty() => (
                    session.messages.delete_by_id(role, id),
                    format!("with ID: {id}"),
                ),
                (_, Some(needle)) if !needle.is_empty() => (
                    session.messages.delete_matching(role, needle),
                    format!("containing: {needle}"),
                ),
                _ => {
                    return Err(ToolError::invalid(
                        NAME,
                        "provide message_id or content_contains",
                    ));
                }
            }
        };

        if deleted {
            tracing::debug!(role = %role, target = %target, "Message removed");
            Ok(ToolOutput::new(format!("Deleted {role} message {target}"), "Deleted"))
        } else {
            Ok(ToolOutput::new("Message not found", "Not found"))
        }
    }
}
