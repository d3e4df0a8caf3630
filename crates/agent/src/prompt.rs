//! System prompt construction.
//!
//! Both prompts are rendered from scratch whenever they are needed so the
//! live context they embed is always current.

use std::path::Path;

use parrot_core::session::Session;

const SYSTEM_TEMPLATE: &str = include_str!("../prompts/system.md");
const PRUNER_TEMPLATE: &str = include_str!("../prompts/pruner.md");

/// The agent's system prompt for one iteration.
pub fn system_prompt(session: &Session, working_dir: &Path) -> String {
    let usage = session.context.usage();
    fill(
        SYSTEM_TEMPLATE,
        &[
            ("{ENV_OS}", std::env::consts::OS.to_string()),
            ("{ENV_CWD}", working_dir.display().to_string()),
            ("{CONTEXT_USAGE}", usage.to_string()),
            ("{LIVE_CONTEXT_FILES}", session.context.serialize_files()),
            ("{LIVE_CONTEXT_DIRECTORIES}", session.context.serialize_directories()),
        ],
    )
}

/// The pruner's system prompt: every active message with its size, plus the
/// live context. `target` is the total size in characters to aim for.
pub fn pruner_prompt(session: &Session, target: Option<usize>) -> String {
    let mut messages = String::new();
    for message in session.messages.active() {
        messages.push_str(&format!(
            "- ID: {}, Role: {}, Size: {} chars, Content: {}\n",
            message.id,
            message.role,
            message.content.len(),
            message.content
        ));
    }

    let list = |paths: Vec<String>| {
        if paths.is_empty() {
            "(none)".to_string()
        } else {
            paths.join("\n")
        }
    };
    let files = list(
        session
            .context
            .files()
            .iter()
            .map(|f| f.path.display().to_string())
            .collect(),
    );
    let directories = list(
        session
            .context
            .directories()
            .iter()
            .map(|d| d.path.display().to_string())
            .collect(),
    );

    let target = match target {
        Some(chars) => format!(
            "The context is currently {} characters. Bring it down to about {chars} characters.",
            session.character_count()
        ),
        None => format!(
            "The context is currently {} characters. Remove everything that is no longer needed.",
            session.character_count()
        ),
    };

    fill(
        PRUNER_TEMPLATE,
        &[
            ("{TARGET}", target),
            ("{MESSAGES}", messages),
            ("{LIVE_CONTEXT_FILE_LIST}", files),
            ("{LIVE_CONTEXT_DIRECTORY_LIST}", directories),
            ("{LIVE_CONTEXT_FILES}", session.context.serialize_files()),
            ("{LIVE_CONTEXT_DIRECTORIES}", session.context.serialize_directories()),
        ],
    )
}

/// Substitute placeholders in a single pass over `template`. Inserted values
/// are never scanned again, so file contents that look like placeholders
/// reach the model unchanged.
fn fill(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
