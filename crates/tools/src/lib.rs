//! Built-in tool implementations for parrot.
//!
//! Tools give the agent the ability to act: edit files, run shell commands,
//! choose what the live context tracks, and prune its own history.

pub mod context_tools;
pub mod diff;
pub mod file_delete;
pub mod file_edit;
pub mod file_write;
pub mod remove_message;
pub mod shell;
pub mod update_context;

use std::time::Duration;

use async_trait::async_trait;
use parrot_core::error::ToolError;
use parrot_core::provider::ToolDefinition;
use parrot_core::session::Session;
use parrot_core::tool::{Tool, ToolContext, ToolOutput, ToolRegistry};

pub use context_tools::{ReadDirectoryTool, ReadFileTool, StopReadingDirectoryTool, StopReadingFileTool};
pub use file_delete::DeleteFileTool;
pub use file_edit::EditFileTool;
pub use file_write::CreateFileTool;
pub use remove_message::RemoveMessageTool;
pub use shell::ShellTool;
pub use update_context::UpdateContextTool;

/// Tools the context pruner is allowed to call.
pub const PRUNER_TOOLS: [&str; 3] = [
    remove_message::NAME,
    context_tools::STOP_READING_FILE,
    context_tools::STOP_READING_DIRECTORY,
];

/// Knobs for the built-in tool set.
#[derive(Debug, Clone, Copy)]
pub struct ToolOptions {
    pub shell_timeout: Duration,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            shell_timeout: shell::DEFAULT_TIMEOUT,
        }
    }
}

/// Every built-in tool, as one closed set.
#[derive(Debug, Clone, Copy)]
pub enum Builtin {
    CreateFile(CreateFileTool),
    EditFile(EditFileTool),
    DeleteFile(DeleteFileTool),
    Shell(ShellTool),
    UpdateContext(UpdateContextTool),
    ReadFile(ReadFileTool),
    StopReadingFile(StopReadingFileTool),
    ReadDirectory(ReadDirectoryTool),
    StopReadingDirectory(StopReadingDirectoryTool),
    RemoveMessage(RemoveMessageTool),
}

impl Builtin {
    pub fn all(options: &ToolOptions) -> Vec<Builtin> {
        vec![
            Builtin::CreateFile(CreateFileTool),
            Builtin::EditFile(EditFileTool),
            Builtin::DeleteFile(DeleteFileTool),
            Builtin::Shell(ShellTool::new(options.shell_timeout)),
            Builtin::UpdateContext(UpdateContextTool),
            Builtin::ReadFile(ReadFileTool),
            Builtin::StopReadingFile(StopReadingFileTool),
            Builtin::ReadDirectory(ReadDirectoryTool),
            Builtin::StopReadingDirectory(StopReadingDirectoryTool),
            Builtin::RemoveMessage(RemoveMessageTool),
        ]
    }

    fn inner(&self) -> &dyn Tool {
        match self {
            Builtin::CreateFile(tool) => tool,
            Builtin::EditFile(tool) => tool,
            Builtin::DeleteFile(tool) => tool,
            Builtin::Shell(tool) => tool,
            Builtin::UpdateContext(tool) => tool,
            Builtin::ReadFile(tool) => tool,
            Builtin::StopReadingFile(tool) => tool,
            Builtin::ReadDirectory(tool) => tool,
            Builtin::StopReadingDirectory(tool) => tool,
            Builtin::RemoveMessage(tool) => tool,
        }
    }
}

#[async_trait]
impl Tool for Builtin {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn description(&self) -> String {
        self.inner().description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner().parameters_schema()
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.inner().execute(ctx, arguments).await
    }

    fn to_definition(&self, session: &Session) -> ToolDefinition {
        self.inner().to_definition(session)
    }
}

/// Create a registry holding every built-in tool.
pub fn default_registry(options: &ToolOptions) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in Builtin::all(options) {
        registry.register(Box::new(tool));
    }
    registry
}


#[cfg(test)]
mod tests {
    use super::*;
    use parrot_core::message::ToolCall;
    use tempfile::TempDir;

    #[test]
    fn registry_contains_every_builtin() {
        let registry = default_registry(&ToolOptions::default());
        assert_eq!(
            registry.names(),
            vec![
                "create_file",
                "delete_file",
                "edit_file",
                "read_directory",
                "read_file",
                "remove_message",
                "shell",
                "stop_reading_directory",
                "stop_reading_file",
                "update_context",
            ]
        );
    }

    #[test]
    fn pruner_subset() {
        let registry = default_registry(&ToolOptions::default()).subset(&PRUNER_TOOLS);
        assert_eq!(registry.names().len(), 3);
        assert!(registry.get("shell").is_none());
    }

    #[tokio::test]
    async fn dispatch_reports_schema_violations() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_support::context_in(tmp.path());
        let registry = default_registry(&ToolOptions::default());

        let call = ToolCall::new("c1", "edit_file", r#"{"path": "a.txt"}"#);
        let err = registry.dispatch(&ctx, &call).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let call = ToolCall::new("c2", "remove_message", r#"{"role": "system", "message_id": "x"}"#);
        let err = registry.dispatch(&ctx, &call).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn dispatch_through_builtin_runs_the_tool() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_support::context_in(tmp.path());
        let registry = default_registry(&ToolOptions::default());

        let call = ToolCall::new("c1", "create_file", r#"{"path": "x.txt", "content": "x"}"#);
        let output = registry.dispatch(&ctx, &call).await.unwrap();
        assert_eq!(output.agent, "Created");
        assert!(tmp.path().join("x.txt").exists());
    }
}
