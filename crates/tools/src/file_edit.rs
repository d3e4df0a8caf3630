//! edit_file: exact-substring replacement of the first occurrence.

use async_trait::async_trait;
use parrot_core::error::ToolError;
use parrot_core::tool::{Tool, ToolContext, ToolOutput, decode_params};
use serde::Deserialize;

use crate::diff::render_diff;

pub const NAME: &str = "edit_file";

#[derive(Debug, Deserialize)]
struct EditFileParams {
    path: String,
    old_str: String,
    new_str: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "Edit a file by replacing old_str with new_str. The old_str must match exactly including whitespace and newlines. If old_str appears multiple times, only the first occurrence will be replaced.".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to edit"
                },
                "old_str": {
                    "type": "string",
                    "description": "The exact string to find and replace. Must match exactly including whitespace and newlines."
                },
                "new_str": {
                    "type": "string",
                    "description": "The string to replace old_str with"
                }
            },
            "required": ["path", "old_str", "new_str"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: EditFileParams = decode_params(NAME, arguments)?;
        if params.old_str.is_empty() {
            return Err(ToolError::invalid(NAME, "old_str cannot be empty"));
        }
        let path = ctx.resolve(NAME, &params.path)?;

        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::execution(NAME, format!("failed to read file: {e}")))?;

        if !original.contains(&params.old_str) {
            return Err(ToolError::execution(NAME, "old_str not found in file"));
        }
        let updated = original.replacen(&params.old_str, &params.new_str, 1);

        tokio::fs::write(&path, &updated)
            .await
            .map_err(|e| ToolError::execution(NAME, format!("failed to write file: {e}")))?;

        tracing::debug!(path = %path.display(), "File edited");
        Ok(ToolOutput::new(render_diff(&path, &original, &updated), "Updated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context_in;
    use tempfile::TempDir;

    #[tokio::test]
    async fn replaces_only_first_occurrence() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "foo bar foo\n").unwrap();
        let ctx = context_in(tmp.path());

        let output = EditFileTool
            .execute(
                &ctx,
                serde_json::json!({"path": "a.txt", "old_str": "foo", "new_str": "baz"}),
            )
            .await
            .unwrap();

        assert_eq!(output.agent, "Updated");
        let content = std::fs::read_to_string(tmp.path().join("a.txt")).unwrap();
        assert_eq!(content, "baz bar foo\n");
    }

    #[tokio::test]
    async fn missing_substring_fails_without_writing() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "hello\n").unwrap();
        let ctx = context_in(tmp.path());

        let err = EditFileTool
            .execute(
                &ctx,
                serde_json::json!({"path": "a.txt", "old_str": "Hello", "new_str": "x"}),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("old_str not found in file"));
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn missing_file_is_execution_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let err = EditFileTool
            .execute(
                &ctx,
                serde_json::json!({"path": "nope.txt", "old_str": "a", "new_str": "b"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
