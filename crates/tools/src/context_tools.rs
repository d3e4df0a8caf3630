//! Single-item live context tools.
//!
//! `read_file`, `stop_reading_file`, `read_directory` and
//! `stop_reading_directory` each change one entry. `update_context` covers
//! the batch case.

use async_trait::async_trait;
use parrot_core::context::{DirectoryEntry, FileEntry};
use parrot_core::error::{ContextError, ToolError};
use parrot_core::tool::{Tool, ToolContext, ToolOutput, decode_params};
use serde::Deserialize;

pub const READ_FILE: &str = "read_file";
pub const STOP_READING_FILE: &str = "stop_reading_file";
pub const READ_DIRECTORY: &str = "read_directory";
pub const STOP_READING_DIRECTORY: &str = "stop_reading_directory";

fn store_error(tool_name: &str, err: ContextError) -> ToolError {
    match err {
        ContextError::EmptyPath | ContextError::InvalidPath(_) => ToolError::invalid(tool_name, err),
        other => ToolError::execution(tool_name, other),
    }
}

fn path_schema(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": description }
        },
        "required": ["path"]
    })
}

#[derive(Debug, Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ReadFileParams {
    path: String,
    #[serde(default)]
    start_line: Option<i64>,
    #[serde(default)]
    end_line: Option<i64>,
}

/// Start tracking a file, optionally a line range of it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        READ_FILE
    }

    fn description(&self) -> String {
        "Add a file to the live context. Its current contents are shown to you before every response until you stop reading it. Use start_line and end_line to read only part of a large file.".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the file to read" },
                "start_line": { "type": "integer", "description": "First line to read, 1-based", "minimum": 1 },
                "end_line": { "type": "integer", "description": "Last line to read, inclusive. Negative counts from the end (-1 is the last line)" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: ReadFileParams = decode_params(READ_FILE, arguments)?;
        let start = params.start_line.unwrap_or(1).max(1);
        if let Some(end) = params.end_line
            && end > 0
            && start > end
        {
            return Err(ToolError::invalid(
                READ_FILE,
                format!("start_line ({start}) must not be greater than end_line ({end})"),
            ));
        }

        let entry = FileEntry::range(&params.path, start as usize, params.end_line);
        let ranged = entry.is_ranged();
        let key = ctx
            .session
            .write()
            .await
            .context
            .add_file(entry)
            .map_err(|e| store_error(READ_FILE, e))?;

        let human = if ranged {
            let end = params
                .end_line
                .map(|n| n.to_string())
                .unwrap_or_else(|| "end".to_string());
            format!("Reading file {} (lines {start}-{end})", key.display())
        } else {
            format!("Reading file {}", key.display())
        };
        Ok(ToolOutput::new(human, "Reading"))
    }
}

/// Stop tracking a file.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopReadingFileTool;

#[async_trait]
impl Tool for StopReadingFileTool {
    fn name(&self) -> &str {
        STOP_READING_FILE
    }

    fn description(&self) -> String {
        "Remove a file from the live context. Use this when a file is no longer relevant.".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        path_schema("Path to the file to stop reading")
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: PathParams = decode_params(STOP_READING_FILE, arguments)?;
        let key = ctx
            .session
            .write()
            .await
            .context
            .remove_file(params.path.as_ref())
            .map_err(|e| store_error(STOP_READING_FILE, e))?;
        Ok(ToolOutput::new(format!("Stopped reading file {}", key.display()), "Stopped"))
    }
}

#[derive(Debug, Deserialize)]
struct ReadDirectoryParams {
    path: String,
    #[serde(default)]
    ignore_gitignore: bool,
    #[serde(default)]
    ignore_patterns: Vec<String>,
}

/// Start tracking a directory listing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadDirectoryTool;

#[async_trait]
impl Tool for ReadDirectoryTool {
    fn name(&self) -> &str {
        READ_DIRECTORY
    }

    fn description(&self) -> String {
        "Add a directory to the live context. Its current structure is shown to you before every response until you stop reading it.".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the directory to read" },
                "ignore_gitignore": { "type": "boolean", "description": "Skip .gitignore rules (default: false)" },
                "ignore_patterns": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Extra glob patterns to ignore (e.g. ['*.tmp', 'build/*'])"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: ReadDirectoryParams = decode_params(READ_DIRECTORY, arguments)?;
        let entry = DirectoryEntry {
            path: params.path.into(),
            respect_gitignore: !params.ignore_gitignore,
            ignore_patterns: params.ignore_patterns,
        };
        let key = ctx
            .session
            .write()
            .await
            .context
            .add_directory(entry)
            .map_err(|e| store_error(READ_DIRECTORY, e))?;
        Ok(ToolOutput::new(format!("Reading directory {}", key.display()), "Reading"))
    }
}

/// Stop tracking a directory listing.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopReadingDirectoryTool;

#[async_trait]
impl Tool for StopReadingDirectoryTool {
    fn name(&self) -> &str {
        STOP_READING_DIRECTORY
    }

    fn description(&self) -> String {
        "Remove a directory from the live context. Use this when a directory structure is no longer relevant.".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        path_schema("Path to the directory to stop reading")
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: PathParams = decode_params(STOP_READING_DIRECTORY, arguments)?;
        let key = ctx
            .session
            .write()
            .await
            .context
            .remove_directory(params.path.as_ref())
            .map_err(|e| store_error(STOP_READING_DIRECTORY, e))?;
        Ok(ToolOutput::new(format!("Stopped reading directory {}", key.display()), "Stopped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context_in;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_then_stop_reading_file() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());

        let output = ReadFileTool.execute(&ctx, json!({"path": "lib.rs"})).await.unwrap();
        assert_eq!(output.agent, "Reading");
        assert!(output.human.starts_with("Reading file "));
        assert_eq!(ctx.session.read().await.context.files().len(), 1);

        let output = StopReadingFileTool
            .execute(&ctx, json!({"path": "lib.rs"}))
            .await
            .unwrap();
        assert_eq!(output.agent, "Stopped");
        assert!(ctx.session.read().await.context.files().is_empty());
    }

    #[tokio::test]
    async fn ranged_read_mentions_lines() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let output = ReadFileTool
            .execute(&ctx, json!({"path": "a.rs", "start_line": 3, "end_line": -1}))
            .await
            .unwrap();
        assert!(output.human.ends_with("(lines 3--1)"));
    }

    #[tokio::test]
    async fn inverted_range_rejected() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let err = ReadFileTool
            .execute(&ctx, json!({"path": "a.rs", "start_line": 9, "end_line": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn stop_reading_untracked_fails() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let err = StopReadingDirectoryTool
            .execute(&ctx, json!({"path": "nowhere"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn read_directory_options() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        ReadDirectoryTool
            .execute(
                &ctx,
                json!({"path": ".", "ignore_gitignore": true, "ignore_patterns": ["*.tmp"]}),
            )
            .await
            .unwrap();
        let session = ctx.session.read().await;
        let dirs = session.context.directories();
        assert_eq!(dirs[0].path, tmp.path());
        assert!(!dirs[0].respect_gitignore);
        assert_eq!(dirs[0].ignore_patterns, vec!["*.tmp".to_string()]);
    }
}
