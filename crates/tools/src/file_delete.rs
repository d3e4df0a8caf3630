//! delete_file: remove a single file.

use async_trait::async_trait;
use parrot_core::error::ToolError;
use parrot_core::tool::{Tool, ToolContext, ToolOutput, decode_params};
use serde::Deserialize;

use crate::diff::render_diff;

pub const NAME: &str = "delete_file";

#[derive(Debug, Deserialize)]
struct DeleteFileParams {
    path: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "Delete a file from the filesystem".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to delete"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: DeleteFileParams = decode_params(NAME, arguments)?;
        let path = ctx.resolve(NAME, &params.path)?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::execution(NAME, format!("failed to read file: {e}")))?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| ToolError::execution(NAME, format!("failed to delete file: {e}")))?;

        tracing::debug!(path = %path.display(), "File deleted");
        Ok(ToolOutput::new(render_diff(&path, &content, ""), "Deleted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context_in;
    use tempfile::TempDir;

    #[tokio::test]
    async fn deletes_existing_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("gone.txt"), "bye\n").unwrap();
        let ctx = context_in(tmp.path());

        let output = DeleteFileTool
            .execute(&ctx, serde_json::json!({"path": "gone.txt"}))
            .await
            .unwrap();

        assert_eq!(output.agent, "Deleted");
        assert!(output.human.contains("- bye"));
        assert!(!tmp.path().join("gone.txt").exists());
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let result = DeleteFileTool
            .execute(&ctx, serde_json::json!({"path": "ghost.txt"}))
            .await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }
}
