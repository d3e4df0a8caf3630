//! Shell tool: execute system commands.
//!
//! Runs the command through the platform shell in the session's working
//! directory with stdout and stderr merged. A non-zero exit status is a
//! normal result; so is hitting the wall-clock timeout, which kills the
//! command's whole process group, background jobs included.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parrot_core::error::ToolError;
use parrot_core::tool::{Tool, ToolContext, ToolOutput, decode_params};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

pub const NAME: &str = "shell";

/// Default wall-clock limit for one command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ShellParams {
    command: String,
}

/// Execute shell commands with a hard timeout.
#[derive(Debug, Clone, Copy)]
pub struct ShellTool {
    timeout: Duration,
}

impl ShellTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", &format!("{command} 2>&1")]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", &format!("exec 2>&1\n{command}")]);
            cmd
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> String {
        "Execute a shell command and return the output. The user will see the command output directly in their terminal. Use this for running build commands, tests, git operations, and other system tasks.".into()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params: ShellParams = decode_params(NAME, arguments)?;
        let command = params.command.trim();
        if command.is_empty() {
            return Err(ToolError::invalid(NAME, "command cannot be empty"));
        }

        let cwd = ctx.working_dir().to_path_buf();
        debug!(command = %command, cwd = %cwd.display(), "Executing shell command");
        ctx.status(format!("$ {command}"));

        let child = self
            .command(command)
            .current_dir(&cwd)
            .spawn()
            .map_err(|e| ToolError::execution(NAME, format!("failed to execute command `{command}`: {e}")))?;

        let pid = child.id();
        let started = Instant::now();
        let waited = tokio::time::timeout(self.timeout, child.wait_with_output()).await;
        let duration = started.elapsed();

        let mut report = format!("Command: {command}\n");
        let output_text = match waited {
            Ok(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                if code != 0 {
                    warn!(command = %command, exit_code = code, "Command exited with failure");
                }
                report.push_str(&format!("Exit code: {code}\n"));
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            Ok(Err(e)) => {
                return Err(ToolError::execution(NAME, format!("failed to wait for command `{command}`: {e}")));
            }
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                if let Some(pid) = pid {
                    kill_group(pid);
                }
                report.push_str(&format!("Timed out after {}s (process killed)\n", self.timeout.as_secs()));
                String::new()
            }
        };

        report.push_str(&format!("Working directory: {}\n", cwd.display()));
        report.push_str(&format!("Duration: {duration:.2?}\n"));
        if output_text.is_empty() {
            report.push_str("Output: (no output)");
        } else {
            report.push_str(&format!("Output: {output_text}"));
        }

        Ok(ToolOutput::new(output_text, report))
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: plain syscall on a process group this tool created.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}
