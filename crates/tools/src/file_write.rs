//! create_file: write a file, creating parent directories as needed.

use async_trait::async_trait;
use parrot_core::error::ToolError;
use parrot_core::tool::{Tool, ToolContext, ToolOutput, decode_params};
use serde::Deserialize;

use crate::diff::render_diff;

pub const NAME: &str = "create_file";

#[derive(Debug, Deserialize)]
struct CreateFileParams {
    path: String,
    content: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "Create a new file with the specified content. If the file already exists, it will be overwritten.".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to create"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: CreateFileParams = decode_params(NAME, arguments)?;
        let path = ctx.resolve(NAME, &params.path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::execution(NAME, format!("failed to create directory {}: {e}", parent.display())))?;
        }

        let previous = tokio::fs::read_to_string(&path).await.ok();
        tokio::fs::write(&path, &params.content)
            .await
            .map_err(|e| ToolError::execution(NAME, format!("failed to write file: {e}")))?;

        tracing::debug!(path = %path.display(), bytes = params.content.len(), "File written");
        let agent = if previous.is_some() { "Updated" } else { "Created" };
        let human = render_diff(&path, previous.as_deref().unwrap_or(""), &params.content);
        Ok(ToolOutput::new(human, agent))
    }
}
