//! Terminal rendering of agent events.
//!
//! The answer goes to stdout as it streams. Tool activity goes to stderr,
//! indented, so piping stdout captures only what the model said.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use parrot_agent::event::{AgentEvent, EventSink};

const ARGUMENT_PREVIEW_CHARS: usize = 120;

#[derive(Debug, Default)]
pub struct TerminalSink {
    /// Streamed text has been printed without a trailing newline.
    mid_line: AtomicBool,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn end_line(&self) {
        if self.mid_line.swap(false, Ordering::Relaxed) {
            println!();
        }
    }
}

impl EventSink for TerminalSink {
    fn emit(&self, event: AgentEvent) {
        match event {
            AgentEvent::Chunk { content } => {
                print!("{content}");
                let _ = std::io::stdout().flush();
                self.mid_line.store(!content.ends_with('\n'), Ordering::Relaxed);
            }
            AgentEvent::ResponseEnd => self.end_line(),
            AgentEvent::ToolCall { name, arguments, .. } => {
                self.end_line();
                eprintln!("  -> {name} {}", preview(&arguments, ARGUMENT_PREVIEW_CHARS));
            }
            AgentEvent::ToolStatus { text, .. } => {
                for line in text.lines() {
                    eprintln!("     {line}");
                }
            }
            AgentEvent::ToolResult { human, .. } => {
                for line in human.lines() {
                    eprintln!("     {line}");
                }
            }
            AgentEvent::ToolFailed { message, .. } => eprintln!("  x {message}"),
            AgentEvent::Notice { message } => {
                self.end_line();
                eprintln!("  {message}");
            }
        }
    }
}

/// First `max` characters of `text` on one line.
pub fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("{\n  \"a\": 1\n}", 50), "{ \"a\": 1 }");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("żółw żółw", 4), "żółw...");
    }
}
