//! update_context: batch changes to the live context in one call.
//!
//! Each of the four keys accepts a path string, an object, or an array of
//! either. Items are applied independently: one bad path does not stop the
//! rest of the batch.

use async_trait::async_trait;
use parrot_core::context::{DirectoryEntry, FileEntry};
use parrot_core::error::ToolError;
use parrot_core::provider::ToolDefinition;
use parrot_core::session::Session;
use parrot_core::tool::{Tool, ToolContext, ToolOutput, decode_params};
use serde::Deserialize;

pub const NAME: &str = "update_context";

/// Keys the consolidator merges across calls.
pub const OPERATION_KEYS: [&str; 4] = ["add_file", "remove_file", "add_directory", "remove_directory"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathSpec {
    Bare(String),
    Object { path: String },
}

impl PathSpec {
    fn path(&self) -> &str {
        match self {
            PathSpec::Bare(path) | PathSpec::Object { path } => path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileOptions {
    path: String,
    #[serde(default)]
    start_line: Option<i64>,
    #[serde(default)]
    end_line: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileSpec {
    Bare(String),
    Detailed(FileOptions),
}

impl FileSpec {
    fn into_options(self) -> FileOptions {
        match self {
            FileSpec::Bare(path) => FileOptions {
                path,
                start_line: None,
                end_line: None,
            },
            FileSpec::Detailed(options) => options,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Patterns {
    List(Vec<String>),
    CommaSeparated(String),
}

impl Patterns {
    fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Patterns::List(items) => items,
            Patterns::CommaSeparated(joined) => joined.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryOptions {
    path: String,
    #[serde(default)]
    ignore_gitignore: bool,
    #[serde(default)]
    ignore_patterns: Option<Patterns>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DirectorySpec {
    Bare(String),
    Detailed(DirectoryOptions),
}

impl DirectorySpec {
    fn into_options(self) -> DirectoryOptions {
        match self {
            DirectorySpec::Bare(path) => DirectoryOptions {
                path,
                ignore_gitignore: false,
                ignore_patterns: None,
            },
            DirectorySpec::Detailed(options) => options,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateContextParams {
    #[serde(default)]
    add_file: Option<OneOrMany<FileSpec>>,
    #[serde(default)]
    remove_file: Option<OneOrMany<PathSpec>>,
    #[serde(default)]
    add_directory: Option<OneOrMany<DirectorySpec>>,
    #[serde(default)]
    remove_directory: Option<OneOrMany<PathSpec>>,
}

#[derive(Debug, Default)]
struct Changes {
    added_files: Vec<String>,
    removed_files: Vec<String>,
    added_dirs: Vec<String>,
    removed_dirs: Vec<String>,
    errors: Vec<String>,
}

impl Changes {
    fn is_empty(&self) -> bool {
        self.added_files.is_empty()
            && self.removed_files.is_empty()
            && self.added_dirs.is_empty()
            && self.removed_dirs.is_empty()
    }

    /// `+`/`-` lines describing what changed.
    fn status_update(&self) -> String {
        if self.is_empty() {
            return "No changes to live context.".to_string();
        }
        let mut out = String::from("> Updated context:\n");
        for path in self.added_files.iter().chain(&self.added_dirs) {
            out.push_str(&format!(" + {path}\n"));
        }
        for path in self.removed_files.iter().chain(&self.removed_dirs) {
            out.push_str(&format!(" - {path}\n"));
        }
        out
    }

    fn error_block(&self) -> String {
        let mut out = String::from("Errors:");
        for err in &self.errors {
            out.push_str(&format!("\n  {err}"));
        }
        out
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateContextTool;

const DESCRIPTION: &str = "Add or remove files and directories from the live context to read their contents and explore structure. This is the primary way to access file contents and directory structures. Live context contents are AUTOMATICALLY REFRESHED before every AI call - you never need to re-add files to get updated content. You can add multiple files and directories at a time. If a file is not relevant or helpful, remove it. Irrelevant files and directories pollute your context and decrease your accuracy.

EXAMPLE - Adding and removing multiple items at once:
{
  \"add_file\": [{\"path\": \"src/main.rs\"}, {\"path\": \"Cargo.toml\", \"start_line\": 1, \"end_line\": 40}],
  \"add_directory\": [{\"path\": \"src\"}],
  \"remove_file\": [{\"path\": \"old/file.txt\"}],
  \"remove_directory\": [{\"path\": \"old/directory\"}]
}
";

#[async_trait]
impl Tool for UpdateContextTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        DESCRIPTION.to_string()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let path_only = |what: &str| {
            serde_json::json!({
                "type": ["string", "object", "array"],
                "description": format!("{what} path(s) to remove from live context: a path, {{\"path\": ...}}, or an array of either"),
                "properties": { "path": { "type": "string" } }
            })
        };
        serde_json::json!({
            "type": "object",
            "properties": {
                "add_file": {
                    "type": ["string", "object", "array"],
                    "description": "File(s) to add: a path, an object, or an array of either",
                    "properties": {
                        "path": { "type": "string", "description": "File path to add to live context" },
                        "start_line": { "type": "integer", "description": "Starting line number, 1-based", "minimum": 1 },
                        "end_line": { "type": "integer", "description": "Ending line number, 1-based; negative counts from the end" }
                    }
                },
                "remove_file": path_only("File"),
                "add_directory": {
                    "type": ["string", "object", "array"],
                    "description": "Directory(ies) to add: a path, an object, or an array of either",
                    "properties": {
                        "path": { "type": "string", "description": "Directory path to add to live context" },
                        "ignore_gitignore": { "type": "boolean", "description": "Skip .gitignore rules (default: false)" },
                        "ignore_patterns": {
                            "type": ["string", "array"],
                            "description": "Extra glob patterns to ignore, as an array or comma-separated (e.g. '*.tmp,build/*')"
                        }
                    }
                },
                "remove_directory": path_only("Directory")
            }
        })
    }

    fn to_definition(&self, session: &Session) -> ToolDefinition {
        let mut description = DESCRIPTION.to_string();
        description.push_str("\nCURRENT LIVE CONTEXT:\nFiles:\n");
        let files = session.context.files();
        for file in &files {
            description.push_str(&format!(" - {}\n", file.path.display()));
        }
        if files.is_empty() {
            description.push_str(" (None)\n");
        }
        description.push_str("Directories:\n");
        let dirs = session.context.directories();
        for dir in &dirs {
            description.push_str(&format!(" - {}\n", dir.path.display()));
        }
        if dirs.is_empty() {
            description.push_str(" (None)\n");
        }
        ToolDefinition {
            name: NAME.to_string(),
            description,
            parameters: self.parameters_schema(),
        }
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: UpdateContextParams = decode_params(NAME, arguments)?;
        if params.add_file.is_none()
            && params.remove_file.is_none()
            && params.add_directory.is_none()
            && params.remove_directory.is_none()
        {
            return Err(ToolError::invalid(
                NAME,
                "no operations specified - provide add_file, remove_file, add_directory, or remove_directory",
            ));
        }

        let mut changes = Changes::default();
        {
            let mut session = ctx.session.write().await;
            let store = session.context.as_mut();

            for spec in params.add_file.map(OneOrMany::into_vec).unwrap_or_default() {
                let options = spec.into_options();
                let start = options.start_line.unwrap_or(1);
                if let Some(end) = options.end_line
                    && end > 0
                    && start >= end
                {
                    changes.errors.push(format!(
                        "start_line ({start}) must be less than end_line ({end}) for file {}",
                        options.path
                    ));
                    continue;
                }
                let entry = FileEntry::range(&options.path, start.max(1) as usize, options.end_line);
                match store.add_file(entry) {
                    Ok(key) => changes.added_files.push(key.display().to_string()),
                    Err(err) => changes.errors.push(format!("Failed to add file {}: {err}", options.path)),
                }
            }

            for spec in params.add_directory.map(OneOrMany::into_vec).unwrap_or_default() {
                let options = spec.into_options();
                let entry = DirectoryEntry {
                    path: options.path.clone().into(),
                    respect_gitignore: !options.ignore_gitignore,
                    ignore_patterns: options.ignore_patterns.map(Patterns::into_vec).unwrap_or_default(),
                };
                match store.add_directory(entry) {
                    Ok(key) => changes.added_dirs.push(key.display().to_string()),
                    Err(err) => changes
                        .errors
                        .push(format!("Failed to add directory {}: {err}", options.path)),
                }
            }

            for spec in params.remove_file.map(OneOrMany::into_vec).unwrap_or_default() {
                match store.remove_file(spec.path().as_ref()) {
                    Ok(key) => changes.removed_files.push(key.display().to_string()),
                    Err(err) => changes
                        .errors
                        .push(format!("Failed to remove file {}: {err}", spec.path())),
                }
            }

            for spec in params.remove_directory.map(OneOrMany::into_vec).unwrap_or_default() {
                match store.remove_directory(spec.path().as_ref()) {
                    Ok(key) => changes.removed_dirs.push(key.display().to_string()),
                    Err(err) => changes
                        .errors
                        .push(format!("Failed to remove directory {}: {err}", spec.path())),
                }
            }
        }

        let status = changes.status_update();
        ctx.status(status.clone());

        if changes.errors.is_empty() {
            return Ok(ToolOutput::new(status, "Ok"));
        }
        if changes.is_empty() {
            return Err(ToolError::execution(NAME, changes.error_block()));
        }
        let report = format!("{status}\n{}", changes.error_block());
        Ok(ToolOutput::new(report.clone(), format!("Partially applied.\n{}", changes.error_block())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context_in;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn accepts_string_object_and_array_forms() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());

        let output = UpdateContextTool
            .execute(
                &ctx,
                json!({
                    "add_file": ["a.rs", {"path": "b.rs", "start_line": 2, "end_line": 9}],
                    "add_directory": "src"
                }),
            )
            .await
            .unwrap();
        assert_eq!(output.agent, "Ok");
        assert!(output.human.contains(" + "));

        let session = ctx.session.read().await;
        let files = session.context.files();
        assert_eq!(files.len(), 2);
        let ranged = files.iter().find(|f| f.path.ends_with("b.rs")).unwrap();
        assert_eq!(ranged.start_line, 2);
        assert_eq!(ranged.end_line, Some(9));
        assert_eq!(session.context.directories().len(), 1);
    }

    #[tokio::test]
    async fn comma_separated_patterns_are_split() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        UpdateContextTool
            .execute(
                &ctx,
                json!({"add_directory": {"path": ".", "ignore_patterns": "*.tmp, build/*", "ignore_gitignore": true}}),
            )
            .await
            .unwrap();
        let session = ctx.session.read().await;
        let dir = &session.context.directories()[0];
        assert_eq!(dir.ignore_patterns, vec!["*.tmp".to_string(), "build/*".to_string()]);
        assert!(!dir.respect_gitignore);
    }

    #[tokio::test]
    async fn no_operations_is_a_validation_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let err = UpdateContextTool.execute(&ctx, json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn partial_failures_are_reported_alongside_successes() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let output = UpdateContextTool
            .execute(
                &ctx,
                json!({"add_file": "keep.rs", "remove_file": "never-added.rs"}),
            )
            .await
            .unwrap();
        assert!(output.agent.starts_with("Partially applied."));
        assert!(output.agent.contains("never-added.rs"));
        assert_eq!(ctx.session.read().await.context.files().len(), 1);
    }

    #[tokio::test]
    async fn all_items_failing_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let err = UpdateContextTool
            .execute(&ctx, json!({"remove_directory": [{"path": "x"}, "y"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn inverted_range_is_rejected_per_item() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        let err = UpdateContextTool
            .execute(&ctx, json!({"add_file": {"path": "a.rs", "start_line": 5, "end_line": 5}}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be less than end_line"));
    }

    #[tokio::test]
    async fn definition_lists_current_context() {
        let tmp = TempDir::new().unwrap();
        let ctx = context_in(tmp.path());
        UpdateContextTool
            .execute(&ctx, json!({"add_file": "tracked.rs"}))
            .await
            .unwrap();
        let session = ctx.session.read().await;
        let definition = UpdateContextTool.to_definition(&session);
        assert!(definition.description.contains("tracked.rs"));
        assert!(definition.description.contains("Directories:\n (None)"));
    }
}
